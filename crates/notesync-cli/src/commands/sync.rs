use std::path::Path;

use notesync_core::db::NoteStore;
use notesync_core::manifest::{FileManifestStore, ManifestStore};
use notesync_core::sync::{Decisions, LocalSyncClient, SyncError, SyncManager};
use notesync_core::web::WebSyncServer;
use notesync_core::{Note, NoteService, SyncReport, TransportError, TransportErrorKind};
use serde::Serialize;

use crate::auth::load_access_token;
use crate::commands::common::{
    format_timestamp, manifest_path, normalize_note_identifier, open_store, resolve_note,
    short_id,
};
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct PendingConflictItem {
    pub note_id: String,
    pub title: String,
    pub local_changed_at: Option<i64>,
    pub remote_changed_at: i64,
}

pub async fn run_sync(
    keep_local: &[String],
    keep_remote: &[String],
    global_profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let server_config = config.server_config(&profile_name)?;
    let token = load_access_token(&profile_name)?
        .ok_or_else(|| CliError::NotAuthorized(profile_name.clone()))?;

    let store = open_store(db_path).await?;
    let decisions = build_decisions(&store, keep_local, keep_remote).await?;
    let manifests = FileManifestStore::new(manifest_path(db_path, &profile_name));
    let client = LocalSyncClient::open(store, manifests).await?;

    let server = WebSyncServer::connect(
        &server_config.server_url,
        server_config.consumer(),
        token,
        server_config.http_timeout(),
    )
    .await
    .map_err(|error| transport_error(error, &profile_name))?;

    let mut manager = SyncManager::with_resolver(client, server, decisions);
    let report = match manager.sync().await {
        Ok(report) => report,
        Err(SyncError::Transport(error)) => return Err(transport_error(error, &profile_name)),
        Err(error) => return Err(error.into()),
    };

    for line in format_report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_sync_conflicts(
    as_json: bool,
    global_profile: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let manifest = FileManifestStore::new(manifest_path(db_path, &profile_name))
        .load()
        .await?;
    let store = open_store(db_path).await?;

    let mut items = Vec::with_capacity(manifest.pending_conflicts.len());
    for (id, remote) in &manifest.pending_conflicts {
        let local = match store.get(id).await {
            Ok(note) => Some(note),
            Err(notesync_core::Error::NotFound(_)) => None,
            Err(error) => return Err(error.into()),
        };
        items.push(pending_conflict_item(local.as_ref(), remote));
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No sync conflicts waiting for a decision.");
        return Ok(());
    }

    for line in format_pending_conflict_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

async fn build_decisions(
    store: &NoteService,
    keep_local: &[String],
    keep_remote: &[String],
) -> Result<Decisions, CliError> {
    let mut local_ids = Vec::with_capacity(keep_local.len());
    for query in keep_local {
        let note = resolve_note(&normalize_note_identifier(query)?, store).await?;
        local_ids.push(note.id);
    }

    let mut decisions = Decisions::new();
    for query in keep_remote {
        let note = resolve_note(&normalize_note_identifier(query)?, store).await?;
        if local_ids.contains(&note.id) {
            return Err(CliError::Config(format!(
                "note {} cannot be both --keep-local and --keep-remote",
                short_id(&note.id)
            )));
        }
        decisions = decisions.keep_remote(note.id);
    }
    for id in local_ids {
        decisions = decisions.keep_local(id);
    }
    Ok(decisions)
}

fn transport_error(error: TransportError, profile_name: &str) -> CliError {
    if error.kind() == TransportErrorKind::Unauthorized {
        CliError::NotAuthorized(profile_name.to_string())
    } else {
        CliError::Sync(SyncError::Transport(error))
    }
}

pub fn pending_conflict_item(local: Option<&Note>, remote: &Note) -> PendingConflictItem {
    PendingConflictItem {
        note_id: remote.id.to_string(),
        title: local.map_or_else(|| remote.title.clone(), |note| note.title.clone()),
        local_changed_at: local.map(|note| note.last_change_date),
        remote_changed_at: remote.last_change_date,
    }
}

pub fn format_pending_conflict_lines(items: &[PendingConflictItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let local = item
                .local_changed_at
                .map_or_else(|| "(deleted)".to_string(), format_timestamp);
            format!(
                "{}  local={}  remote={}  {}",
                item.note_id.chars().take(13).collect::<String>(),
                local,
                format_timestamp(item.remote_changed_at),
                item.title
            )
        })
        .collect()
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(downgrade) = &report.manifest_downgrade {
        lines.push(format!("Warning: {downgrade}"));
    }

    if report.is_empty() && report.conflicts.is_empty() {
        lines.push(format!(
            "Already up to date (server revision {})",
            report.revision
        ));
        return lines;
    }

    lines.push(format!(
        "Sync completed at server revision {}: {} uploaded, {} applied, {} deleted on server, {} deleted locally",
        report.revision,
        report.uploaded.len(),
        report.applied.len(),
        report.deleted_remote.len(),
        report.deleted_local.len()
    ));
    for conflict in &report.conflicts {
        lines.push(format!(
            "conflict  {}  {:<10}  {}",
            short_id(&conflict.note_id),
            conflict.outcome.label(),
            conflict.local.title_preview(60)
        ));
    }
    if report.unresolved_conflicts().next().is_some() {
        lines.push(
            "Resolve with `notesync sync --keep-local <ID>` or `notesync sync --keep-remote <ID>`."
                .to_string(),
        );
    }
    lines
}
