use std::path::Path;

use crate::commands::common::{
    format_timestamp, normalize_note_identifier, note_to_list_item, open_store, resolve_note,
};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_note_identifier(id)?;
    let store = open_store(db_path).await?;
    let note = resolve_note(&normalized_id, &store).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&note_to_list_item(&note))?);
        return Ok(());
    }

    println!("{}", note.title);
    println!("id:       {}", note.id);
    println!("created:  {}", format_timestamp(note.created_at));
    println!("changed:  {}", format_timestamp(note.last_change_date));
    println!("revision: {}", note.revision);
    if !note.body.is_empty() {
        println!();
        println!("{}", note.body);
    }
    Ok(())
}
