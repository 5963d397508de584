//! notesync CLI - keep notes locally and sync them with a Tomboy server

mod auth;
mod callback;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync, run_sync_conflicts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "notesync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Commands::Config { command } => return run_config(command, profile),
        Commands::Auth { command } => return run_auth(command, profile).await,
        Commands::Completions { shell, output } => {
            return run_completions(shell, output.as_deref());
        }
        _ => {}
    }

    let db_path = resolve_db_path(cli.db_path)?;
    match cli.command {
        Commands::Add { title, body } => run_add(&title, &body, &db_path).await?,
        Commands::List { limit, json } => run_list(limit, json, &db_path).await?,
        Commands::Show { id, json } => run_show(&id, json, &db_path).await?,
        Commands::Edit { id, title, body } => run_edit(&id, title, body, &db_path).await?,
        Commands::Delete { id } => run_delete(&id, &db_path).await?,
        Commands::Sync {
            command: Some(SyncCommands::Conflicts { json }),
            ..
        } => run_sync_conflicts(json, profile, &db_path).await?,
        Commands::Sync {
            command: None,
            keep_local,
            keep_remote,
        } => run_sync(&keep_local, &keep_remote, profile, &db_path).await?,
        Commands::Config { .. } | Commands::Auth { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}
