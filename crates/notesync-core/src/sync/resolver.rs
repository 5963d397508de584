//! Conflict resolution policies

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Note, NoteId};

/// What to do with a note both sides changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Push the local copy to the server
    KeepLocal,
    /// Replace the local copy with the server's
    KeepRemote,
    /// Touch neither copy and report the conflict again next pass
    Defer,
}

/// Decides conflicts during a sync pass
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, local: &Note, remote: &Note) -> Resolution;
}

/// The later `last_change_date` wins; a tie is deferred
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriterWins;

impl ConflictResolver for LastWriterWins {
    fn resolve(&self, local: &Note, remote: &Note) -> Resolution {
        match local.last_change_date.cmp(&remote.last_change_date) {
            Ordering::Greater => Resolution::KeepLocal,
            Ordering::Less => Resolution::KeepRemote,
            Ordering::Equal => Resolution::Defer,
        }
    }
}

/// Explicit per-note choices, with last-writer-wins for everything else
#[derive(Debug, Clone, Default)]
pub struct Decisions {
    choices: HashMap<NoteId, Resolution>,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn keep_local(mut self, id: NoteId) -> Self {
        self.choices.insert(id, Resolution::KeepLocal);
        self
    }

    #[must_use]
    pub fn keep_remote(mut self, id: NoteId) -> Self {
        self.choices.insert(id, Resolution::KeepRemote);
        self
    }

    pub fn insert(&mut self, id: NoteId, resolution: Resolution) {
        self.choices.insert(id, resolution);
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

impl ConflictResolver for Decisions {
    fn resolve(&self, local: &Note, remote: &Note) -> Resolution {
        self.choices
            .get(&local.id)
            .copied()
            .unwrap_or_else(|| LastWriterWins.resolve(local, remote))
    }
}
