//! Tomboy REST API 1.0 JSON documents

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Note, NoteId};
use crate::transport::TransportError;

/// Version tag Tomboy clients put on note content
pub const NOTE_CONTENT_VERSION: f64 = 0.1;

const DELETE_COMMAND: &str = "delete";

/// `GET /api/1.0/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiRoot {
    pub oauth_request_token_url: String,
    pub oauth_authorize_url: String,
    pub oauth_access_token_url: String,
    #[serde(rename = "api-version", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(rename = "user-ref", default, skip_serializing_if = "Option::is_none")]
    pub user_ref: Option<ResourceRef>,
}

/// Link to another API document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ResourceRef {
    pub api_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// `GET user-ref.api-ref`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserDocument {
    #[serde(default)]
    pub user_name: String,
    pub latest_sync_revision: i64,
    pub current_sync_guid: String,
    pub notes_ref: ResourceRef,
}

/// `GET notes-ref`, with or without `include_notes`, and the `PUT` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotesDocument {
    pub latest_sync_revision: i64,
    #[serde(default)]
    pub notes: Vec<WireNote>,
}

/// `PUT notes-ref` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NoteChanges {
    pub latest_sync_revision: i64,
    pub note_changes: Vec<NoteChange>,
}

/// One entry of `note-changes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteChange {
    Delete { guid: String, command: String },
    Update(WireNote),
}

impl NoteChange {
    pub fn delete(id: &NoteId) -> Self {
        Self::Delete {
            guid: id.to_string(),
            command: DELETE_COMMAND.to_string(),
        }
    }

    pub fn update(note: &Note) -> Self {
        Self::Update(WireNote::from(note))
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { command, .. } if command == DELETE_COMMAND)
    }
}

/// A note as the server sends and receives it
///
/// Note lists without `include_notes` carry only `guid` and `title`, so
/// every other field is optional on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WireNote {
    pub guid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub note_content: String,
    #[serde(default = "default_content_version")]
    pub note_content_version: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_change_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_metadata_change_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_revision: Option<i64>,
    #[serde(default)]
    pub open_on_startup: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

const fn default_content_version() -> f64 {
    NOTE_CONTENT_VERSION
}

impl From<&Note> for WireNote {
    fn from(note: &Note) -> Self {
        let last_change = format_date(note.last_change_date);
        Self {
            guid: note.id.to_string(),
            title: note.title.clone(),
            note_content: note.body.clone(),
            note_content_version: NOTE_CONTENT_VERSION,
            last_metadata_change_date: Some(last_change.clone()),
            last_change_date: Some(last_change),
            create_date: Some(format_date(note.created_at)),
            last_sync_revision: None,
            open_on_startup: false,
            pinned: false,
            tags: Vec::new(),
        }
    }
}

impl WireNote {
    /// Note id, rejecting guids that are not UUIDs
    pub fn id(&self) -> Result<NoteId, TransportError> {
        self.guid
            .parse()
            .map_err(|_| TransportError::protocol(format!("invalid note guid '{}'", self.guid)))
    }

    /// Convert into the local model
    ///
    /// `revision` is the server revision the note last changed at.
    pub fn into_note(self) -> Result<Note, TransportError> {
        let id = self.id()?;
        let last_change_date = match self
            .last_change_date
            .as_deref()
            .or(self.last_metadata_change_date.as_deref())
        {
            Some(raw) => parse_date(raw)?,
            None => 0,
        };
        let created_at = match self.create_date.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => last_change_date,
        };

        Ok(Note {
            id,
            title: self.title,
            body: self.note_content,
            created_at,
            last_change_date,
            revision: self.last_sync_revision.unwrap_or_default(),
        })
    }
}

/// Unix milliseconds as RFC 3339 with an explicit offset
pub fn format_date(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// RFC 3339 date with any offset and any fractional precision, as Unix milliseconds
pub fn parse_date(raw: &str) -> Result<i64, TransportError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|date| date.timestamp_millis())
        .map_err(|error| TransportError::protocol(format!("invalid date '{raw}': {error}")))
}
