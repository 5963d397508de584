use std::path::Path;

use notesync_core::db::NoteStore;
use notesync_core::Note;

use crate::commands::common::{normalize_title, open_store, resolve_note_body};
use crate::error::CliError;

pub async fn run_add(title: &str, body_parts: &[String], db_path: &Path) -> Result<(), CliError> {
    let title = normalize_title(title)?;
    let body = resolve_note_body(body_parts)?;

    let store = open_store(db_path).await?;
    let note = store.save(&Note::new(title, body)).await?;

    println!("{}", note.id);
    Ok(())
}
