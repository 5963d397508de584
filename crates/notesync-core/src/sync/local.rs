//! Sync client backed by the local note store

use async_trait::async_trait;

use super::error::{SyncError, SyncResult};
use super::traits::SyncClient;
use crate::db::NoteStore;
use crate::error::Error;
use crate::manifest::{ManifestDowngrade, ManifestError, ManifestStore, SyncManifest};
use crate::models::{Note, NoteId};

/// [`SyncClient`] over a [`NoteStore`] and a [`ManifestStore`]
pub struct LocalSyncClient<S, M> {
    store: S,
    manifest_store: M,
    manifest: SyncManifest,
    downgrade: Option<ManifestDowngrade>,
}

impl<S: NoteStore, M: ManifestStore> LocalSyncClient<S, M> {
    /// Load the manifest and wrap the store
    ///
    /// A corrupt manifest is replaced by an empty one and reported through
    /// [`SyncClient::manifest_downgrade`]; IO failures are returned.
    pub async fn open(store: S, manifest_store: M) -> SyncResult<Self> {
        let (manifest, downgrade) = match manifest_store.load().await {
            Ok(manifest) => (manifest, None),
            Err(ManifestError::Corrupt(reason)) => {
                tracing::warn!("Ignoring corrupt sync manifest, next sync is a full sync: {reason}");
                (
                    SyncManifest::default(),
                    Some(ManifestDowngrade::Corrupt { reason }),
                )
            }
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            store,
            manifest_store,
            manifest,
            downgrade,
        })
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn manifest_store(&self) -> &M {
        &self.manifest_store
    }
}

#[async_trait]
impl<S: NoteStore, M: ManifestStore> SyncClient for LocalSyncClient<S, M> {
    fn manifest(&self) -> &SyncManifest {
        &self.manifest
    }

    fn manifest_downgrade(&self) -> Option<&ManifestDowngrade> {
        self.downgrade.as_ref()
    }

    async fn all_notes(&self) -> SyncResult<Vec<Note>> {
        Ok(self.store.list_all().collect_all().await?)
    }

    async fn upload_notes(&self, notes: &[(Note, Option<i64>)]) -> SyncResult<Vec<Note>> {
        let mut stored = Vec::with_capacity(notes.len());
        for (note, expected_revision) in notes {
            let imported = self
                .store
                .import(note, *expected_revision)
                .await
                .map_err(|error| local_change(error, note.id))?;
            stored.push(imported);
        }
        Ok(stored)
    }

    async fn delete_notes(&self, notes: &[(NoteId, i64)]) -> SyncResult<()> {
        for (id, expected_revision) in notes {
            self.store
                .delete_if_unchanged(id, *expected_revision)
                .await
                .map_err(|error| local_change(error, *id))?;
        }
        Ok(())
    }

    async fn commit_manifest(&mut self, manifest: SyncManifest) -> SyncResult<()> {
        manifest.validate()?;
        self.manifest_store.save(&manifest).await?;
        self.manifest = manifest;
        self.downgrade = None;
        Ok(())
    }
}

fn local_change(error: Error, id: NoteId) -> SyncError {
    match error {
        Error::Changed(_) => SyncError::LocalChanged(id),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::MemoryManifestStore;
    use crate::services::NoteService;

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_manifest_is_reported_as_downgrade() {
        let store = NoteService::open_in_memory().await.unwrap();
        let manifests = MemoryManifestStore::with_raw("{ definitely not json");

        let client = LocalSyncClient::open(store, manifests).await.unwrap();
        assert_eq!(client.manifest(), &SyncManifest::default());
        assert!(matches!(
            client.manifest_downgrade(),
            Some(ManifestDowngrade::Corrupt { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn changed_since_sync_compares_against_manifest() {
        let store = NoteService::open_in_memory().await.unwrap();
        let synced = store.save(&Note::new("synced", "")).await.unwrap();
        let edited = store.save(&Note::new("edited", "")).await.unwrap();
        let edited = store.save(&edited).await.unwrap();
        let fresh = store.save(&Note::new("fresh", "")).await.unwrap();

        let mut manifest = SyncManifest::default();
        manifest.note_revisions.insert(synced.id, synced.revision);
        manifest.note_revisions.insert(edited.id, 1);
        let manifests = MemoryManifestStore::new();
        manifests.save(&manifest).await.unwrap();

        let client = LocalSyncClient::open(store, manifests).await.unwrap();
        let mut changed: Vec<NoteId> = client
            .notes_changed_since_sync()
            .await
            .unwrap()
            .into_iter()
            .map(|note| note.id)
            .collect();
        changed.sort();

        let mut expected = vec![edited.id, fresh.id];
        expected.sort();
        assert_eq!(changed, expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writes_refuse_notes_edited_after_planning() {
        let store = NoteService::open_in_memory().await.unwrap();
        let planned = store.save(&Note::new("t", "planned")).await.unwrap();
        let mut edited = planned.clone();
        edited.body = "edited".into();
        store.save(&edited).await.unwrap();

        let client = LocalSyncClient::open(store.clone(), MemoryManifestStore::new())
            .await
            .unwrap();

        let mut remote = planned.clone();
        remote.body = "remote".into();
        let error = client
            .upload_notes(&[(remote, Some(planned.revision))])
            .await
            .unwrap_err();
        assert!(matches!(error, SyncError::LocalChanged(id) if id == planned.id));

        let error = client
            .delete_notes(&[(planned.id, planned.revision)])
            .await
            .unwrap_err();
        assert!(matches!(error, SyncError::LocalChanged(id) if id == planned.id));

        assert_eq!(store.get(&planned.id).await.unwrap().body, "edited");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_persists_and_clears_downgrade() {
        let store = NoteService::open_in_memory().await.unwrap();
        let manifests = MemoryManifestStore::with_raw("[]");
        let mut client = LocalSyncClient::open(store, manifests.clone()).await.unwrap();
        assert!(client.manifest_downgrade().is_some());

        let manifest = SyncManifest {
            last_synced_revision: 4,
            ..SyncManifest::default()
        };
        client.commit_manifest(manifest.clone()).await.unwrap();

        assert!(client.manifest_downgrade().is_none());
        assert_eq!(client.current_revision(), 4);
        assert_eq!(manifests.load().await.unwrap(), manifest);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_manifest_is_never_committed() {
        let store = NoteService::open_in_memory().await.unwrap();
        let manifests = MemoryManifestStore::new();
        let mut client = LocalSyncClient::open(store, manifests.clone()).await.unwrap();

        let result = client
            .commit_manifest(SyncManifest {
                last_synced_revision: -1,
                ..SyncManifest::default()
            })
            .await;
        assert!(result.is_err());
        assert!(manifests.raw().is_none());
    }
}
