//! Note store errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a local note store operation
#[derive(Error, Debug)]
pub enum Error {
    /// The store holds data it cannot interpret
    #[error("Database error: {0}")]
    Database(String),

    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Creating the database directory failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No note with this id exists in the store
    #[error("Note not found: {0}")]
    NotFound(String),

    /// The stored note moved past the revision the caller read
    #[error("Note changed since it was read: {0}")]
    Changed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
