//! Service layer shared by the CLI and the sync client

mod database;

pub use database::NoteService;
