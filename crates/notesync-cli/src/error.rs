use std::io;

use notesync_core::manifest::ManifestError;
use notesync_core::oauth::AuthorizationError;
use notesync_core::sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] notesync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("Note title cannot be empty")]
    EmptyTitle,
    #[error("Edited note content cannot be empty")]
    EmptyEditedContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Keychain error: {0}")]
    Keychain(String),
    #[error("Profile '{0}' has no server configured. Run `notesync config init --server-url <URL>` first.")]
    ServerNotConfigured(String),
    #[error("Profile '{0}' is not authorized. Run `notesync auth login` first.")]
    NotAuthorized(String),
}
