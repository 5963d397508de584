use std::env;

use crate::cli::ConfigCommands;
use crate::config_profiles::{normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            server_url,
            callback_port,
            consumer_key,
            consumer_secret,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileUpdate {
                server_url,
                callback_port,
                consumer_key,
                consumer_secret,
            },
            no_activate,
        ),
        ConfigCommands::Show { profile } => run_config_show(profile.as_deref().or(global_profile)),
    }
}

/// Values given on the command line for `config init`
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub server_url: Option<String>,
    pub callback_port: Option<u16>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
}

impl ProfileUpdate {
    /// Merge flags, then `NOTESYNC_SERVER_URL`, then the existing profile
    pub fn merge_into(self, profile: &mut CliProfile, env_server_url: Option<String>) {
        if let Some(url) = normalize_text_option(self.server_url)
            .or_else(|| normalize_text_option(env_server_url))
        {
            profile.server_url = Some(url);
        }
        if let Some(port) = self.callback_port {
            profile.callback_port = Some(port);
        }
        if let Some(key) = normalize_text_option(self.consumer_key) {
            profile.consumer_key = Some(key);
        }
        if let Some(secret) = normalize_text_option(self.consumer_secret) {
            profile.consumer_secret = Some(secret);
        }
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let profile = config.profile_mut_or_default(&profile_name);
    update.merge_into(profile, env::var("NOTESYNC_SERVER_URL").ok());
    if profile.server_url().is_some() {
        profile.server_config(&profile_name)?;
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let ready = config
        .profile(&profile_name)
        .and_then(CliProfile::server_url)
        .is_some();
    if ready {
        println!("Run `notesync auth login --profile {profile_name}` to authorize this profile.");
    } else {
        println!("Profile '{profile_name}' is missing: server_url");
    }
    Ok(())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    let active = config.active_profile.as_deref() == Some(profile_name.as_str());
    println!(
        "Profile '{profile_name}'{}",
        if active { " (active)" } else { "" }
    );
    println!(
        "  server_url:    {}",
        profile.server_url().as_deref().unwrap_or("(not set)")
    );
    println!("  callback_port: {}", profile.callback_port());
    println!(
        "  consumer_key:  {}",
        profile.consumer_key.as_deref().unwrap_or("(default)")
    );
    println!(
        "  consumer:      {}",
        if profile.consumer_secret.is_some() {
            "custom secret"
        } else {
            "default secret"
        }
    );
    Ok(())
}
