//! Sync conflict model

use serde::{Deserialize, Serialize};

use super::{Note, NoteId};

/// How a conflict ended up after a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictOutcome {
    /// The local copy was pushed to the server
    LocalWins,
    /// The server copy replaced the local one
    RemoteWins,
    /// Both copies were left untouched until someone decides
    Unresolved,
}

impl ConflictOutcome {
    /// Short label used in logs and CLI output
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LocalWins => "local",
            Self::RemoteWins => "remote",
            Self::Unresolved => "unresolved",
        }
    }
}

/// A note changed on both sides since the last common revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Note involved in the conflict
    pub note_id: NoteId,
    /// Client copy at the time of the pass
    pub local: Note,
    /// Server copy at the time of the pass
    pub remote: Note,
    /// What the pass did about it
    pub outcome: ConflictOutcome,
}

impl Conflict {
    /// Whether one side was chosen during the pass
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        !matches!(self.outcome, ConflictOutcome::Unresolved)
    }
}
