use std::path::Path;

use notesync_core::db::NoteStore;
use notesync_core::Note;

use crate::commands::common::{
    capture_editor_input_with_initial, compose_note_text, normalize_note_identifier,
    normalize_title, open_store, resolve_note, split_note_text,
};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    title: Option<String>,
    body: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let store = open_store(db_path).await?;
    let note = resolve_note(&normalized_id, &store).await?;

    let (title, body) = if title.is_none() && body.is_none() {
        let initial = compose_note_text(&note.title, &note.body);
        let Some(edited) = capture_editor_input_with_initial(&initial)? else {
            return Err(CliError::EmptyEditedContent);
        };
        split_note_text(&edited)
    } else {
        (
            title.unwrap_or_else(|| note.title.clone()),
            body.map_or_else(|| note.body.clone(), |body| body.trim().to_string()),
        )
    };

    let edited = Note {
        title: normalize_title(&title)?,
        body,
        ..note.clone()
    };
    if edited.same_content(&note) {
        println!("{}", note.id);
        return Ok(());
    }

    let updated = store.save(&edited).await?;
    println!("{}", updated.id);
    Ok(())
}
