//! Sync pass errors

use thiserror::Error;

use crate::manifest::ManifestError;
use crate::models::NoteId;
use crate::transport::TransportError;

/// Why a sync pass was aborted. The manifest is untouched in every case.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Local store error: {0}")]
    Store(#[from] crate::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// A local note was saved while the pass was running; syncing again picks it up
    #[error("Note {0} was edited during sync, run sync again")]
    LocalChanged(NoteId),
}

pub type SyncResult<T> = Result<T, SyncError>;
