//! The two sides of a sync pass

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::error::SyncError;
use crate::manifest::{ManifestDowngrade, SyncManifest};
use crate::models::{Note, NoteId};
use crate::transport::TransportError;

/// Remote note collection with a server-wide revision counter
#[async_trait]
pub trait SyncServer: Send + Sync {
    /// Sync GUID of the server's note store; changes when the store is replaced
    async fn server_id(&self) -> Result<String, TransportError>;

    /// Latest server revision
    async fn current_revision(&self) -> Result<i64, TransportError>;

    /// Every note changed after `revision`
    async fn notes_changed_since(&self, revision: i64) -> Result<Vec<Note>, TransportError>;

    /// Ids of every note currently on the server
    async fn note_ids(&self) -> Result<BTreeSet<NoteId>, TransportError>;

    /// Create or replace notes on the server
    async fn upload_notes(&self, notes: &[Note]) -> Result<(), TransportError>;

    /// Remove notes from the server
    async fn delete_notes(&self, ids: &[NoteId]) -> Result<(), TransportError>;
}

/// Local note collection plus the manifest describing its last sync
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Manifest as of the last committed pass
    fn manifest(&self) -> &SyncManifest;

    /// Set when the persisted manifest had to be replaced by an empty one
    fn manifest_downgrade(&self) -> Option<&ManifestDowngrade>;

    /// Server revision this client last synchronized with
    fn current_revision(&self) -> i64 {
        self.manifest().last_synced_revision
    }

    /// Every local note
    async fn all_notes(&self) -> Result<Vec<Note>, SyncError>;

    /// Local notes whose revision moved past their manifest entry, new notes included
    async fn notes_changed_since_sync(&self) -> Result<Vec<Note>, SyncError> {
        let manifest = self.manifest();
        Ok(self
            .all_notes()
            .await?
            .into_iter()
            .filter(|note| manifest.is_changed_locally(note))
            .collect())
    }

    /// Apply server notes locally and return the stored copies
    ///
    /// Each note carries the local revision it was planned against, `None`
    /// when it was absent. A note saved since then fails the call with
    /// [`SyncError::LocalChanged`] instead of being overwritten.
    async fn upload_notes(&self, notes: &[(Note, Option<i64>)]) -> Result<Vec<Note>, SyncError>;

    /// Remove notes locally, each only while it is still at the given revision
    async fn delete_notes(&self, notes: &[(NoteId, i64)]) -> Result<(), SyncError>;

    /// Persist `manifest` durably and make it the current one
    async fn commit_manifest(&mut self, manifest: SyncManifest) -> Result<(), SyncError>;
}
