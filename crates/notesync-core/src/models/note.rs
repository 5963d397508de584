//! Note model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a note.
///
/// New ids use UUID v7 (time-sortable); any UUID parses, since servers hand
/// out v4 guids for notes created elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A note in the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Stable identifier, never changes once assigned
    pub id: NoteId,
    /// Note title
    pub title: String,
    /// Note body
    pub body: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last content change (Unix ms)
    pub last_change_date: i64,
    /// Revision at which this note was last touched in its store
    pub revision: i64,
}

impl Note {
    /// Create a new, not yet stored note
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: NoteId::new(),
            title: title.into(),
            body: body.into(),
            created_at: now,
            last_change_date: now,
            revision: 0,
        }
    }

    /// Whether title and body match another copy of the note
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.title == other.title && self.body == other.body
    }

    /// Get first line of the title (or body when untitled), truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        let source = if self.title.trim().is_empty() {
            &self.body
        } else {
            &self.title
        };
        source
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}
