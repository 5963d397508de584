//! One synchronization pass between a client and a server

use std::collections::{BTreeMap, BTreeSet};

use super::error::SyncResult;
use super::report::SyncReport;
use super::resolver::{ConflictResolver, LastWriterWins, Resolution};
use super::traits::{SyncClient, SyncServer};
use crate::manifest::{ManifestDowngrade, SyncManifest};
use crate::models::{Conflict, ConflictOutcome, Note, NoteId};

/// Drives sync passes for one client/server pair
///
/// `sync` takes `&mut self`, so two passes can never overlap on the same client.
pub struct SyncManager<C, S, R = LastWriterWins> {
    client: C,
    server: S,
    resolver: R,
}

impl<C: SyncClient, S: SyncServer> SyncManager<C, S> {
    /// Manager resolving conflicts by last writer wins
    pub const fn new(client: C, server: S) -> Self {
        Self {
            client,
            server,
            resolver: LastWriterWins,
        }
    }
}

impl<C: SyncClient, S: SyncServer, R: ConflictResolver> SyncManager<C, S, R> {
    pub const fn with_resolver(client: C, server: S, resolver: R) -> Self {
        Self {
            client,
            server,
            resolver,
        }
    }

    pub const fn client(&self) -> &C {
        &self.client
    }

    pub const fn server(&self) -> &S {
        &self.server
    }

    pub fn into_parts(self) -> (C, S) {
        (self.client, self.server)
    }

    /// Run one full pass
    ///
    /// Any error aborts the pass before the manifest is touched, so the next
    /// attempt starts again from the last committed state.
    pub async fn sync(&mut self) -> SyncResult<SyncReport> {
        let mut downgrade = self.client.manifest_downgrade().cloned();
        if let Some(downgrade) = &downgrade {
            tracing::warn!("Syncing without a usable manifest: {downgrade}");
        }

        let server_id = self.server.server_id().await?;
        let mut base = self.client.manifest().clone();
        if let Some(previous) = base.server_id.clone() {
            if previous != server_id {
                let changed = ManifestDowngrade::ServerChanged {
                    previous,
                    current: server_id.clone(),
                };
                tracing::warn!("{changed}");
                downgrade = Some(changed);
                base = SyncManifest::default();
            }
        }

        let server_revision = self.server.current_revision().await?;
        tracing::debug!(
            "Starting sync: server at revision {server_revision}, last synced {}",
            base.last_synced_revision
        );

        let local_notes = self
            .client
            .all_notes()
            .await?
            .into_iter()
            .map(|note| (note.id, note))
            .collect();
        let remote = self.remote_delta(&base, server_revision).await?;
        let plan = Plan::build(&base, local_notes, remote, &self.resolver);

        self.apply(plan, base, server_id, server_revision, downgrade)
            .await
    }

    async fn remote_delta(
        &self,
        base: &SyncManifest,
        server_revision: i64,
    ) -> SyncResult<RemoteDelta> {
        if server_revision == base.last_synced_revision {
            tracing::debug!("Server unchanged since revision {server_revision}");
            return Ok(RemoteDelta::default());
        }

        let changed = self
            .server
            .notes_changed_since(base.last_synced_revision)
            .await?
            .into_iter()
            .map(|note| (note.id, note))
            .collect();
        let on_server = self.server.note_ids().await?;
        let deleted = base
            .note_revisions
            .keys()
            .chain(base.pending_conflicts.keys())
            .filter(|id| !on_server.contains(id))
            .copied()
            .collect();

        Ok(RemoteDelta { changed, deleted })
    }

    async fn apply(
        &mut self,
        plan: Plan,
        base: SyncManifest,
        server_id: String,
        server_revision: i64,
        downgrade: Option<ManifestDowngrade>,
    ) -> SyncResult<SyncReport> {
        if !plan.upload.is_empty() {
            self.server.upload_notes(&plan.upload).await?;
        }
        if !plan.delete_remote.is_empty() {
            self.server.delete_notes(&plan.delete_remote).await?;
        }
        let imported = if plan.import.is_empty() {
            Vec::new()
        } else {
            self.client.upload_notes(&plan.import).await?
        };
        if !plan.delete_local.is_empty() {
            self.client.delete_notes(&plan.delete_local).await?;
        }

        // Our own writes moved the server revision
        let revision = if plan.upload.is_empty() && plan.delete_remote.is_empty() {
            server_revision
        } else {
            self.server.current_revision().await?
        };

        let mut manifest = base;
        manifest.last_synced_revision = revision;
        manifest.server_id = Some(server_id);
        for note in plan.upload.iter().chain(&imported) {
            manifest.note_revisions.insert(note.id, note.revision);
        }
        for (id, revision) in &plan.in_sync {
            manifest.note_revisions.insert(*id, *revision);
        }
        for id in &plan.forget {
            manifest.note_revisions.remove(id);
        }
        manifest.pending_conflicts = plan.pending;

        if manifest == *self.client.manifest() {
            tracing::debug!("Manifest unchanged at revision {revision}");
        } else {
            self.client.commit_manifest(manifest).await?;
        }

        let report = SyncReport {
            uploaded: plan.upload.iter().map(|note| note.id).collect(),
            applied: imported.iter().map(|note| note.id).collect(),
            deleted_remote: plan.delete_remote,
            deleted_local: plan.delete_local.iter().map(|(id, _)| *id).collect(),
            conflicts: plan.conflicts,
            revision,
            manifest_downgrade: downgrade,
        };
        tracing::info!(
            "Sync finished at revision {}: {} uploaded, {} applied, {} deleted remotely, {} deleted locally, {} conflicts",
            report.revision,
            report.uploaded.len(),
            report.applied.len(),
            report.deleted_remote.len(),
            report.deleted_local.len(),
            report.conflicts.len()
        );
        Ok(report)
    }
}

/// Server changes since the last synced revision
#[derive(Debug, Default)]
struct RemoteDelta {
    changed: BTreeMap<NoteId, Note>,
    deleted: BTreeSet<NoteId>,
}

/// Every write a pass will make, decided before any of them happens
#[derive(Debug, Default)]
struct Plan {
    upload: Vec<Note>,
    delete_remote: Vec<NoteId>,
    /// Server copies to store, with the local revision they replace
    import: Vec<(Note, Option<i64>)>,
    delete_local: Vec<(NoteId, i64)>,
    /// Changed on both sides to the same content
    in_sync: Vec<(NoteId, i64)>,
    forget: Vec<NoteId>,
    conflicts: Vec<Conflict>,
    pending: BTreeMap<NoteId, Note>,
}

impl Plan {
    fn build<R: ConflictResolver + ?Sized>(
        base: &SyncManifest,
        local_notes: BTreeMap<NoteId, Note>,
        remote: RemoteDelta,
        resolver: &R,
    ) -> Self {
        let local_deleted: BTreeSet<NoteId> = base
            .note_revisions
            .keys()
            .filter(|id| !local_notes.contains_key(id))
            .copied()
            .collect();
        let local_revisions: BTreeMap<NoteId, i64> = local_notes
            .iter()
            .map(|(id, note)| (*id, note.revision))
            .collect();
        let mut local_changed: BTreeMap<NoteId, Note> = local_notes
            .into_iter()
            .filter(|(_, note)| base.is_changed_locally(note))
            .collect();

        let RemoteDelta {
            changed: mut remote_changed,
            deleted: remote_deleted,
        } = remote;
        for (id, snapshot) in &base.pending_conflicts {
            if !remote_deleted.contains(id) {
                remote_changed
                    .entry(*id)
                    .or_insert_with(|| snapshot.clone());
            }
        }

        let ids: BTreeSet<NoteId> = local_changed
            .keys()
            .chain(remote_changed.keys())
            .chain(&local_deleted)
            .chain(&remote_deleted)
            .copied()
            .collect();

        let mut plan = Self::default();
        for id in ids {
            match (local_changed.remove(&id), remote_changed.remove(&id)) {
                (Some(local), Some(remote)) => plan.reconcile(local, remote, resolver),
                (Some(local), None) => {
                    if remote_deleted.contains(&id) {
                        tracing::debug!("Note {id} was deleted on the server but edited here; uploading it again");
                    }
                    plan.upload.push(local);
                }
                (None, Some(remote)) => {
                    if local_deleted.contains(&id) {
                        tracing::debug!("Note {id} was deleted here but edited on the server; restoring it");
                    }
                    plan.import.push((remote, local_revisions.get(&id).copied()));
                }
                (None, None) => {
                    match (local_deleted.contains(&id), remote_deleted.contains(&id)) {
                        (true, false) => plan.delete_remote.push(id),
                        (false, true) => {
                            if let Some(revision) = local_revisions.get(&id) {
                                plan.delete_local.push((id, *revision));
                            }
                        }
                        _ => {}
                    }
                    plan.forget.push(id);
                }
            }
        }
        plan
    }

    fn reconcile<R: ConflictResolver + ?Sized>(&mut self, local: Note, remote: Note, resolver: &R) {
        if local.same_content(&remote) {
            self.in_sync.push((local.id, local.revision));
            return;
        }

        let outcome = match resolver.resolve(&local, &remote) {
            Resolution::KeepLocal => {
                self.upload.push(local.clone());
                ConflictOutcome::LocalWins
            }
            Resolution::KeepRemote => {
                self.import.push((remote.clone(), Some(local.revision)));
                ConflictOutcome::RemoteWins
            }
            Resolution::Defer => {
                self.pending.insert(remote.id, remote.clone());
                ConflictOutcome::Unresolved
            }
        };
        tracing::info!(
            "Conflict on note {}: {}",
            local.id,
            outcome.label()
        );
        self.conflicts.push(Conflict {
            note_id: local.id,
            local,
            remote,
            outcome,
        });
    }
}
