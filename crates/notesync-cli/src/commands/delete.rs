use std::path::Path;

use notesync_core::db::NoteStore;

use crate::commands::common::{normalize_note_identifier, open_store, resolve_note};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let store = open_store(db_path).await?;
    let note = resolve_note(&normalized_id, &store).await?;

    store.delete(&note.id).await?;
    println!("{}", note.id);
    Ok(())
}
