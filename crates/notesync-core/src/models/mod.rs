//! Data models for notesync

mod conflict;
mod note;

pub use conflict::{Conflict, ConflictOutcome};
pub use note::{Note, NoteId};
