use std::time::Duration;

use notesync_core::oauth::perform_handshake;

use crate::auth::{clear_access_token, load_access_token, save_access_token};
use crate::callback::LoopbackCallback;
use crate::cli::AuthCommands;
use crate::config_profiles::{CliProfile, CliProfilesConfig, DEFAULT_CALLBACK_PORT};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            profile,
            timeout_secs,
        } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let server_config = config.server_config(&profile_name)?;
            let port = config
                .profile(&profile_name)
                .map_or(DEFAULT_CALLBACK_PORT, CliProfile::callback_port);

            let callback = LoopbackCallback::bind(port, Duration::from_secs(timeout_secs)).await?;
            let server_config = server_config
                .with_callback_url(callback.callback_url())
                .map_err(|error| CliError::Config(error.to_string()))?;

            let token = perform_handshake(&server_config, &callback).await?;
            save_access_token(&profile_name, &token)?;
            println!(
                "Authorized profile '{profile_name}' against {}",
                server_config.server_url
            );
            Ok(())
        }
        AuthCommands::Status { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let Some(server_url) = config
                .profile(&profile_name)
                .and_then(CliProfile::server_url)
            else {
                println!("Profile '{profile_name}' is not configured.");
                return Ok(());
            };

            if load_access_token(&profile_name)?.is_some() {
                println!("Profile '{profile_name}' is authorized against {server_url}");
            } else {
                println!("Profile '{profile_name}' is not authorized.");
            }
            Ok(())
        }
        AuthCommands::Logout { profile } => {
            let config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            clear_access_token(&profile_name)?;
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
