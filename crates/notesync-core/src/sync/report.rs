//! Outcome of a sync pass

use serde::Serialize;

use crate::manifest::ManifestDowngrade;
use crate::models::{Conflict, ConflictOutcome, NoteId};

/// What one sync pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Notes sent to the server
    pub uploaded: Vec<NoteId>,
    /// Server notes written into the local store
    pub applied: Vec<NoteId>,
    /// Notes removed from the server because they were deleted here
    pub deleted_remote: Vec<NoteId>,
    /// Local notes removed because they were deleted on the server
    pub deleted_local: Vec<NoteId>,
    /// Every note both sides changed, resolved or not
    pub conflicts: Vec<Conflict>,
    /// Server revision recorded in the manifest
    pub revision: i64,
    /// Set when the pass had to start from an empty manifest
    pub manifest_downgrade: Option<ManifestDowngrade>,
}

impl SyncReport {
    /// No note moved in either direction
    pub fn is_empty(&self) -> bool {
        self.uploaded.is_empty()
            && self.applied.is_empty()
            && self.deleted_remote.is_empty()
            && self.deleted_local.is_empty()
    }

    /// Conflicts still waiting for a decision
    pub fn unresolved_conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts
            .iter()
            .filter(|conflict| conflict.outcome == ConflictOutcome::Unresolved)
    }
}
