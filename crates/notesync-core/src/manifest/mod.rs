//! Sync manifest: what this client knew about the server after its last pass

mod store;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Note, NoteId};

pub use store::{FileManifestStore, ManifestStore, MemoryManifestStore};

/// Errors raised while loading or persisting a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Persisted manifest could not be parsed or failed validation
    #[error("Manifest is corrupt: {0}")]
    Corrupt(String),

    /// IO error
    #[error("Manifest IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest could not be serialized
    #[error("Manifest serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-client record of the last synchronized state
///
/// `note_revisions` maps each note to the local revision it had when it was
/// last known to match the server. Replaced wholesale on every successful
/// pass, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncManifest {
    /// Server revision reached by the last successful pass
    pub last_synced_revision: i64,
    /// Local revision of each note at the time it was last synchronized
    #[serde(default)]
    pub note_revisions: BTreeMap<NoteId, i64>,
    /// Sync GUID the server reported during the last pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    /// Server copies of conflicts waiting for a decision
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pending_conflicts: BTreeMap<NoteId, Note>,
}

impl SyncManifest {
    /// Check the invariants a persisted manifest must satisfy
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.last_synced_revision < 0 {
            return Err(ManifestError::Corrupt(format!(
                "negative last synced revision {}",
                self.last_synced_revision
            )));
        }

        if let Some((id, revision)) = self.note_revisions.iter().find(|(_, rev)| **rev < 0) {
            return Err(ManifestError::Corrupt(format!(
                "negative revision {revision} for note {id}"
            )));
        }

        if let Some((id, _)) = self
            .pending_conflicts
            .iter()
            .find(|(id, note)| note.id != **id)
        {
            return Err(ManifestError::Corrupt(format!(
                "pending conflict {id} holds a different note"
            )));
        }

        Ok(())
    }

    /// Revision recorded for a note, `None` when the note was never synchronized
    #[must_use]
    pub fn revision_of(&self, id: &NoteId) -> Option<i64> {
        self.note_revisions.get(id).copied()
    }

    /// Whether `note` moved past its recorded revision. Never-synchronized notes count as changed.
    #[must_use]
    pub fn is_changed_locally(&self, note: &Note) -> bool {
        self.revision_of(&note.id)
            .map_or(true, |synced| note.revision > synced)
    }

    /// Whether no pass has completed against any server yet
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.last_synced_revision == 0
            && self.note_revisions.is_empty()
            && self.server_id.is_none()
    }
}

/// Why a sync pass started from an empty manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ManifestDowngrade {
    /// The persisted manifest could not be read
    Corrupt {
        /// Parse or validation failure
        reason: String,
    },
    /// The server reported a different sync GUID than the manifest recorded
    ServerChanged {
        /// GUID stored in the manifest
        previous: String,
        /// GUID the server reports now
        current: String,
    },
}

impl fmt::Display for ManifestDowngrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupt { reason } => {
                write!(f, "manifest was corrupt ({reason}); started a full sync")
            }
            Self::ServerChanged { previous, current } => write!(
                f,
                "server sync id changed from {previous} to {current}; started a full sync"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_manifest_is_fresh_and_valid() {
        let manifest = SyncManifest::default();
        assert!(manifest.is_fresh());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn local_change_is_judged_against_recorded_revision() {
        let synced = Note {
            revision: 2,
            ..Note::new("synced", "")
        };
        let mut manifest = SyncManifest::default();
        manifest.note_revisions.insert(synced.id, 2);

        assert!(!manifest.is_changed_locally(&synced));
        assert!(manifest.is_changed_locally(&Note {
            revision: 3,
            ..synced.clone()
        }));
        assert!(manifest.is_changed_locally(&Note::new("never synced", "")));
    }

    #[test]
    fn negative_revisions_fail_validation() {
        let mut manifest = SyncManifest {
            last_synced_revision: -1,
            ..SyncManifest::default()
        };
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::Corrupt(_))
        ));

        manifest.last_synced_revision = 3;
        manifest.note_revisions.insert(NoteId::new(), -4);
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::Corrupt(_))
        ));
    }

    #[test]
    fn mismatched_pending_conflict_fails_validation() {
        let mut manifest = SyncManifest::default();
        manifest
            .pending_conflicts
            .insert(NoteId::new(), Note::new("other", ""));
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn serializes_with_kebab_case_keys() {
        let id: NoteId = "1c1b2d3e-4f50-4a6b-8c7d-9e0f1a2b3c4d".parse().unwrap();
        let mut manifest = SyncManifest {
            last_synced_revision: 2,
            ..SyncManifest::default()
        };
        manifest.note_revisions.insert(id, 1);

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "last-synced-revision": 2,
                "note-revisions": { "1c1b2d3e-4f50-4a6b-8c7d-9e0f1a2b3c4d": 1 }
            })
        );
    }

    #[test]
    fn downgrade_messages_name_the_cause() {
        let downgrade = ManifestDowngrade::ServerChanged {
            previous: "a".into(),
            current: "b".into(),
        };
        assert!(downgrade.to_string().contains("from a to b"));
    }
}
