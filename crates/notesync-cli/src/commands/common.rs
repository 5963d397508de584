use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use notesync_core::db::NoteStore;
use notesync_core::{Note, NoteId, NoteService};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub last_change_date: i64,
    pub relative_time: String,
    pub revision: i64,
}

pub async fn open_store(db_path: &Path) -> Result<NoteService, CliError> {
    Ok(NoteService::open_path(db_path).await?)
}

pub async fn list_notes(limit: usize, db_path: &Path) -> Result<Vec<Note>, CliError> {
    let store = open_store(db_path).await?;
    Ok(store.list_recent(limit).await?)
}

/// Find a note by full id or by a unique id prefix
pub async fn resolve_note(note_query: &str, store: &NoteService) -> Result<Note, CliError> {
    if let Ok(note_id) = note_query.parse::<NoteId>() {
        match store.get(&note_id).await {
            Ok(note) => return Ok(note),
            Err(notesync_core::Error::NotFound(_)) => {}
            Err(error) => return Err(error.into()),
        }
    }

    let matches = store.find_by_prefix(note_query, 3).await?;
    match matches.as_slice() {
        [] => Err(CliError::NoteNotFound(note_query.to_string())),
        [note] => Ok(note.clone()),
        _ => {
            let options = matches
                .iter()
                .map(|note| short_id(&note.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousNoteId(format!(
                "ID prefix '{note_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &NoteId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            let short_id = short_id(&note.id);
            let preview = note_preview(note, 40);
            let relative_time = format_relative_time(note.last_change_date, now_ms);
            format!("{short_id:<13}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        title: note.title.clone(),
        body: note.body.clone(),
        created_at: note.created_at,
        last_change_date: note.last_change_date,
        relative_time: format_relative_time(note.last_change_date, now_ms),
        revision: note.revision,
    }
}

pub fn note_preview(note: &Note, max_chars: usize) -> String {
    let first_line = note.title_preview(usize::MAX);
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Body from arguments, then piped stdin, then the editor; empty when all are empty
pub fn resolve_note_body(body_parts: &[String]) -> Result<String, CliError> {
    if let Some(body) = normalize_content(&body_parts.join(" ")) {
        return Ok(body);
    }

    if let Some(body) = read_piped_stdin()? {
        return Ok(body);
    }

    Ok(capture_editor_input()?.unwrap_or_default())
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    let title = title.lines().next().unwrap_or_default().trim();
    if title.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(title.to_string())
    }
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyNoteId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Editor text for a note: title on the first line, body after a blank line
pub fn compose_note_text(title: &str, body: &str) -> String {
    if body.is_empty() {
        format!("{title}\n")
    } else {
        format!("{title}\n\n{body}\n")
    }
}

/// Inverse of [`compose_note_text`]
pub fn split_note_text(text: &str) -> (String, String) {
    let text = text.trim_start();
    let (title, body) = text.split_once('\n').unwrap_or((text, ""));
    (title.trim().to_string(), body.trim().to_string())
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_note_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let note_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&note_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_note_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("notesync-note-{}-{now}.txt", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match cli_db_path.or_else(|| env::var_os("NOTESYNC_DB_PATH").map(PathBuf::from)) {
        Some(path) => Ok(path),
        None => default_db_path(),
    }
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("notesync").join("notes.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Sync manifest of a profile, kept next to the database it describes
pub fn manifest_path(db_path: &Path, profile_name: &str) -> PathBuf {
    let file_name = format!("manifest-{profile_name}.json");
    match db_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(file_name),
        _ => PathBuf::from(file_name),
    }
}
