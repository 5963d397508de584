//! Note store contract and its libSQL implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use async_trait::async_trait;
use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{Note, NoteId};

/// Page size used by [`NoteStore::list_all`]
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Local note storage
///
/// Every mutation bumps the note's revision, and `last_change_date` never
/// moves backwards for a stored note.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Insert or update a note edited on this device and return the stored copy
    ///
    /// A new note gets revision 1; an existing one gets its previous revision
    /// plus one. `last_change_date` is set to now, or one past the previous
    /// value when the clock has not moved.
    async fn save(&self, note: &Note) -> Result<Note>;

    /// Insert or update a note received from the server
    ///
    /// Keeps the incoming timestamps but still bumps the local revision. An
    /// existing note never gets an older `last_change_date` than it had.
    ///
    /// `expected_revision` is the local revision the caller last read: `None`
    /// means the note must not exist yet. Fails with [`Error::Changed`] and
    /// writes nothing when the stored note no longer matches.
    async fn import(&self, note: &Note, expected_revision: Option<i64>) -> Result<Note>;

    /// Fetch a note by id
    async fn get(&self, id: &NoteId) -> Result<Note>;

    /// Remove a note. Removing a missing note succeeds.
    async fn delete(&self, id: &NoteId) -> Result<()>;

    /// Remove a note only while it is still at `expected_revision`
    ///
    /// A missing note succeeds; a note saved since it was read fails with
    /// [`Error::Changed`] and stays in the store.
    async fn delete_if_unchanged(&self, id: &NoteId, expected_revision: i64) -> Result<()>;

    /// Up to `limit` notes ordered by id, starting after `after`
    async fn list_page(&self, after: Option<NoteId>, limit: usize) -> Result<Vec<Note>>;

    /// Lazily walk every stored note in id order
    fn list_all(&self) -> NoteCursor<'_, Self>
    where
        Self: Sized,
    {
        NoteCursor::new(self, DEFAULT_PAGE_SIZE)
    }
}

/// Finite, restartable walk over a [`NoteStore`], fetched one page at a time
pub struct NoteCursor<'a, S: NoteStore + ?Sized> {
    store: &'a S,
    after: Option<NoteId>,
    page_size: usize,
    exhausted: bool,
}

impl<'a, S: NoteStore + ?Sized> NoteCursor<'a, S> {
    /// Start a walk from the first note
    pub fn new(store: &'a S, page_size: usize) -> Self {
        Self {
            store,
            after: None,
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    /// Next page of notes, or `None` once every note has been returned
    pub async fn next_page(&mut self) -> Result<Option<Vec<Note>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self.store.list_page(self.after, self.page_size).await?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        match page.last() {
            Some(last) => {
                self.after = Some(last.id);
                Ok(Some(page))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Drain the remaining pages into one vector
    pub async fn collect_all(mut self) -> Result<Vec<Note>> {
        let mut notes = Vec::new();
        while let Some(page) = self.next_page().await? {
            notes.extend(page);
        }
        Ok(notes)
    }
}

/// libSQL implementation of `NoteStore`
pub struct LibSqlNoteStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlNoteStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Notes whose id starts with `prefix`, most recently changed first
    pub async fn find_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<Note>> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Err(Error::InvalidInput("Note id prefix cannot be empty".into()));
        }

        let mut rows = self
            .conn
            .query(
                "SELECT id, title, body, created_at, last_change_date, revision
                 FROM notes
                 WHERE id LIKE ?
                 ORDER BY last_change_date DESC
                 LIMIT ?",
                params![format!("{prefix}%"), limit as i64],
            )
            .await?;

        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }

    /// Notes ordered by most recent change
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<Note>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, body, created_at, last_change_date, revision
                 FROM notes
                 ORDER BY last_change_date DESC
                 LIMIT ?",
                params![limit as i64],
            )
            .await?;

        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }

    async fn find(&self, id: &NoteId) -> Result<Option<Note>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, body, created_at, last_change_date, revision
                 FROM notes WHERE id = ?",
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_note(&row)?)),
            None => Ok(None),
        }
    }

    /// Parse a note from a database row
    fn parse_note(row: &Row) -> Result<Note> {
        let id: String = row.get(0)?;
        Ok(Note {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("Invalid note id in store: {id}")))?,
            title: row.get(1)?,
            body: row.get(2)?,
            created_at: row.get(3)?,
            last_change_date: row.get(4)?,
            revision: row.get(5)?,
        })
    }
}

#[async_trait]
impl NoteStore for LibSqlNoteStore<'_> {
    async fn save(&self, note: &Note) -> Result<Note> {
        let now = chrono::Utc::now().timestamp_millis();

        self.conn
            .execute(
                "INSERT INTO notes (id, title, body, created_at, last_change_date, revision)
                 VALUES (?, ?, ?, ?, ?, 1)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    body = excluded.body,
                    last_change_date = MAX(excluded.last_change_date, notes.last_change_date + 1),
                    revision = notes.revision + 1",
                params![
                    note.id.as_str(),
                    note.title.as_str(),
                    note.body.as_str(),
                    note.created_at,
                    now
                ],
            )
            .await?;

        self.get(&note.id).await
    }

    async fn import(&self, note: &Note, expected_revision: Option<i64>) -> Result<Note> {
        let written = match expected_revision {
            None => {
                self.conn
                    .execute(
                        "INSERT INTO notes (id, title, body, created_at, last_change_date, revision)
                         VALUES (?, ?, ?, ?, ?, 1)
                         ON CONFLICT(id) DO NOTHING",
                        params![
                            note.id.as_str(),
                            note.title.as_str(),
                            note.body.as_str(),
                            note.created_at,
                            note.last_change_date
                        ],
                    )
                    .await?
            }
            Some(revision) => {
                self.conn
                    .execute(
                        "UPDATE notes SET
                            title = ?,
                            body = ?,
                            created_at = ?,
                            last_change_date = MAX(?, last_change_date + 1),
                            revision = revision + 1
                         WHERE id = ? AND revision = ?",
                        params![
                            note.title.as_str(),
                            note.body.as_str(),
                            note.created_at,
                            note.last_change_date,
                            note.id.as_str(),
                            revision
                        ],
                    )
                    .await?
            }
        };

        if written == 0 {
            return Err(Error::Changed(note.id.to_string()));
        }
        self.get(&note.id).await
    }

    async fn get(&self, id: &NoteId) -> Result<Note> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &NoteId) -> Result<()> {
        self.conn
            .execute("DELETE FROM notes WHERE id = ?", params![id.as_str()])
            .await?;
        Ok(())
    }

    async fn delete_if_unchanged(&self, id: &NoteId, expected_revision: i64) -> Result<()> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM notes WHERE id = ? AND revision = ?",
                params![id.as_str(), expected_revision],
            )
            .await?;

        if removed == 0 && self.find(id).await?.is_some() {
            return Err(Error::Changed(id.to_string()));
        }
        Ok(())
    }

    async fn list_page(&self, after: Option<NoteId>, limit: usize) -> Result<Vec<Note>> {
        let after = after.map(|id| id.as_str()).unwrap_or_default();
        let mut rows = self
            .conn
            .query(
                "SELECT id, title, body, created_at, last_change_date, revision
                 FROM notes
                 WHERE id > ?
                 ORDER BY id
                 LIMIT ?",
                params![after, limit as i64],
            )
            .await?;

        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_new_note_starts_at_revision_one() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let draft = Note::new("Groceries", "milk");
        let stored = store.save(&draft).await.unwrap();

        assert_eq!(stored.id, draft.id);
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.title, "Groceries");
        assert!(stored.last_change_date >= draft.created_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_bumps_revision_and_change_date() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let first = store.save(&Note::new("t", "one")).await.unwrap();
        let mut edited = first.clone();
        edited.body = "two".into();
        let second = store.save(&edited).await.unwrap();

        assert_eq!(second.revision, 2);
        assert!(second.last_change_date > first.last_change_date);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.body, "two");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_import_keeps_remote_timestamps() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let mut remote = Note::new("remote", "body");
        remote.created_at = 1_000;
        remote.last_change_date = 2_000;
        remote.revision = 42;

        let stored = store.import(&remote, None).await.unwrap();
        assert_eq!(stored.created_at, 1_000);
        assert_eq!(stored.last_change_date, 2_000);
        assert_eq!(stored.revision, 1);

        let newer = Note {
            last_change_date: 5_000,
            ..remote.clone()
        };
        let again = store.import(&newer, Some(1)).await.unwrap();
        assert_eq!(again.revision, 2);
        assert_eq!(again.last_change_date, 5_000);

        // An older copy still moves the change date forward
        let older = store.import(&remote, Some(2)).await.unwrap();
        assert_eq!(older.revision, 3);
        assert_eq!(older.last_change_date, 5_001);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_import_refuses_note_saved_since_it_was_read() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let read = store.save(&Note::new("t", "as read")).await.unwrap();
        let mut typed = read.clone();
        typed.body = "typed meanwhile".into();
        store.save(&typed).await.unwrap();

        let mut remote = read.clone();
        remote.body = "from server".into();
        let result = store.import(&remote, Some(read.revision)).await;
        assert!(matches!(result, Err(Error::Changed(_))));

        let kept = store.get(&read.id).await.unwrap();
        assert_eq!(kept.body, "typed meanwhile");
        assert_eq!(kept.revision, 2);

        // A note created locally after the read is not replaced either
        let fresh = store.save(&Note::new("new", "local")).await.unwrap();
        let result = store.import(&fresh, None).await;
        assert!(matches!(result, Err(Error::Changed(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_if_unchanged_keeps_newer_edit() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let read = store.save(&Note::new("t", "b")).await.unwrap();
        let mut edited = read.clone();
        edited.body = "still wanted".into();
        store.save(&edited).await.unwrap();

        let result = store.delete_if_unchanged(&read.id, read.revision).await;
        assert!(matches!(result, Err(Error::Changed(_))));
        assert_eq!(store.get(&read.id).await.unwrap().body, "still wanted");

        store.delete_if_unchanged(&read.id, 2).await.unwrap();
        assert!(matches!(store.get(&read.id).await, Err(Error::NotFound(_))));

        // Already gone
        store.delete_if_unchanged(&read.id, 2).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_note_is_not_found() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let result = store.get(&NoteId::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_is_idempotent() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let note = store.save(&Note::new("t", "b")).await.unwrap();
        store.delete(&note.id).await.unwrap();
        store.delete(&note.id).await.unwrap();

        assert!(matches!(store.get(&note.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_all_walks_every_page_in_id_order() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let mut ids = Vec::new();
        for i in 0..7 {
            let note = store
                .save(&Note::new(format!("note {i}"), "body"))
                .await
                .unwrap();
            ids.push(note.id);
        }
        ids.sort();

        let mut cursor = NoteCursor::new(&store, 3);
        let mut pages = Vec::new();
        while let Some(page) = cursor.next_page().await.unwrap() {
            pages.push(page.len());
        }
        assert_eq!(pages, vec![3, 3, 1]);
        assert!(cursor.next_page().await.unwrap().is_none());

        let all: Vec<NoteId> = store
            .list_all()
            .collect_all()
            .await
            .unwrap()
            .into_iter()
            .map(|note| note.id)
            .collect();
        assert_eq!(all, ids);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_all_on_empty_store() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let notes = store.list_all().collect_all().await.unwrap();
        assert!(notes.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_find_by_prefix() {
        let db = setup().await;
        let store = LibSqlNoteStore::new(db.connection());

        let note = store.save(&Note::new("t", "b")).await.unwrap();
        let prefix: String = note.id.as_str().chars().take(8).collect();

        let found = store.find_by_prefix(&prefix.to_uppercase(), 3).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, note.id);

        assert!(store.find_by_prefix("  ", 3).await.is_err());
    }
}
