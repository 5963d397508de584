//! Shared note service wrapper used by the CLI and the sync client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{Database, LibSqlNoteStore, NoteStore};
use crate::models::{Note, NoteId};
use crate::Result;

/// Thread-safe handle to the local note database.
///
/// Every operation takes the lock, so writes from a sync pass never
/// interleave with another writer on the same handle.
#[derive(Clone)]
pub struct NoteService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl NoteService {
    /// Open a note service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::debug!("Opening note database at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory note service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, `None` for in-memory services.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Notes whose id starts with `prefix`.
    pub async fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.find_by_prefix(prefix, limit).await
    }

    /// List notes newest-first.
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.list_recent(limit).await
    }
}

#[async_trait]
impl NoteStore for NoteService {
    async fn save(&self, note: &Note) -> Result<Note> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.save(note).await
    }

    async fn import(&self, note: &Note, expected_revision: Option<i64>) -> Result<Note> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.import(note, expected_revision).await
    }

    async fn get(&self, id: &NoteId) -> Result<Note> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.get(id).await
    }

    async fn delete(&self, id: &NoteId) -> Result<()> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.delete(id).await
    }

    async fn delete_if_unchanged(&self, id: &NoteId, expected_revision: i64) -> Result<()> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.delete_if_unchanged(id, expected_revision).await
    }

    async fn list_page(&self, after: Option<NoteId>, limit: usize) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        let store = LibSqlNoteStore::new(db.connection());
        store.list_page(after, limit).await
    }
}
