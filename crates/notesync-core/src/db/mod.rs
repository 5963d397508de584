//! Database layer for notesync

mod connection;
mod migrations;
mod store;

pub use connection::Database;
pub use store::{LibSqlNoteStore, NoteCursor, NoteStore, DEFAULT_PAGE_SIZE};
