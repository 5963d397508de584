//! In-process sync server for tests and offline experiments

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::traits::SyncServer;
use crate::models::{Note, NoteId};
use crate::transport::{TransportError, TransportErrorKind};

#[derive(Debug)]
struct ServerState {
    server_id: String,
    revision: i64,
    notes: BTreeMap<NoteId, Note>,
    offline: bool,
    fail_uploads: bool,
}

/// [`SyncServer`] held in memory
///
/// The revision goes up by one for every note written or removed, and each
/// stored note carries the revision it was last written at. Clones share state,
/// so a test can keep a handle while the sync manager owns another.
#[derive(Debug, Clone)]
pub struct MemorySyncServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for MemorySyncServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySyncServer {
    /// Empty server at revision 0 with a random sync id
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ServerState {
                server_id: Uuid::new_v4().to_string(),
                revision: 0,
                notes: BTreeMap::new(),
                offline: false,
                fail_uploads: false,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online(&self) -> Result<MutexGuard<'_, ServerState>, TransportError> {
        let state = self.state();
        if state.offline {
            return Err(TransportError::network("server is offline"));
        }
        Ok(state)
    }

    /// Write a note as another device would; returns the stored copy
    pub fn put_remote_note(&self, note: &Note) -> Note {
        let mut state = self.state();
        state.revision += 1;
        let stored = Note {
            revision: state.revision,
            ..note.clone()
        };
        state.notes.insert(stored.id, stored.clone());
        stored
    }

    /// Remove a note as another device would
    pub fn remove_remote_note(&self, id: &NoteId) {
        let mut state = self.state();
        if state.notes.remove(id).is_some() {
            state.revision += 1;
        }
    }

    /// Current copy of a note
    pub fn note(&self, id: &NoteId) -> Option<Note> {
        self.state().notes.get(id).cloned()
    }

    /// Every stored note in id order
    pub fn notes(&self) -> Vec<Note> {
        self.state().notes.values().cloned().collect()
    }

    pub fn revision(&self) -> i64 {
        self.state().revision
    }

    pub fn id(&self) -> String {
        self.state().server_id.clone()
    }

    /// Drop every note and take a new sync id, as a server reset would
    pub fn reset(&self) {
        let mut state = self.state();
        state.server_id = Uuid::new_v4().to_string();
        state.revision = 0;
        state.notes.clear();
    }

    /// Make every call fail with a network error
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    /// Make uploads fail while reads keep working
    pub fn fail_uploads(&self, fail: bool) {
        self.state().fail_uploads = fail;
    }
}

#[async_trait]
impl SyncServer for MemorySyncServer {
    async fn server_id(&self) -> Result<String, TransportError> {
        Ok(self.online()?.server_id.clone())
    }

    async fn current_revision(&self) -> Result<i64, TransportError> {
        Ok(self.online()?.revision)
    }

    async fn notes_changed_since(&self, revision: i64) -> Result<Vec<Note>, TransportError> {
        Ok(self
            .online()?
            .notes
            .values()
            .filter(|note| note.revision > revision)
            .cloned()
            .collect())
    }

    async fn note_ids(&self) -> Result<BTreeSet<NoteId>, TransportError> {
        Ok(self.online()?.notes.keys().copied().collect())
    }

    async fn upload_notes(&self, notes: &[Note]) -> Result<(), TransportError> {
        let mut state = self.online()?;
        if state.fail_uploads {
            return Err(TransportError::new(
                TransportErrorKind::Status(503),
                "upload rejected",
            ));
        }

        for note in notes {
            state.revision += 1;
            let stored = Note {
                revision: state.revision,
                ..note.clone()
            };
            state.notes.insert(stored.id, stored);
        }
        Ok(())
    }

    async fn delete_notes(&self, ids: &[NoteId]) -> Result<(), TransportError> {
        let mut state = self.online()?;
        if state.fail_uploads {
            return Err(TransportError::new(
                TransportErrorKind::Status(503),
                "delete rejected",
            ));
        }

        for id in ids {
            if state.notes.remove(id).is_some() {
                state.revision += 1;
            }
        }
        Ok(())
    }
}
