//! Persistent CLI profile configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use notesync_core::config::{ServerConfig, DEFAULT_HTTP_TIMEOUT_SECS};
use notesync_core::oauth::{DEFAULT_CONSUMER_KEY, DEFAULT_CONSUMER_SECRET};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";
pub const DEFAULT_CALLBACK_PORT: u16 = 9001;
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub callback_port: Option<u16>,
    #[serde(default)]
    pub consumer_key: Option<String>,
    #[serde(default)]
    pub consumer_secret: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("notesync").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Explicit name, then `NOTESYNC_PROFILE`, then the active profile, then `default`
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        self.resolve_profile_name_with_env(
            explicit,
            std::env::var("NOTESYNC_PROFILE").ok().as_deref(),
        )
    }

    pub fn resolve_profile_name_with_env(
        &self,
        explicit: Option<&str>,
        from_env: Option<&str>,
    ) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(from_env))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    /// Server configuration of a profile, failing when it has no server URL
    pub fn server_config(&self, name: &str) -> Result<ServerConfig, CliError> {
        self.profile(name)
            .ok_or_else(|| CliError::ServerNotConfigured(name.to_string()))?
            .server_config(name)
    }

    fn normalize(&mut self) {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        for profile in self.profiles.values_mut() {
            profile.normalize();
        }
    }
}

impl CliProfile {
    pub fn server_url(&self) -> Option<String> {
        normalize_text_option(self.server_url.clone())
    }

    pub fn callback_port(&self) -> u16 {
        self.callback_port.unwrap_or(DEFAULT_CALLBACK_PORT)
    }

    pub fn server_config(&self, name: &str) -> Result<ServerConfig, CliError> {
        let server_url = self
            .server_url()
            .ok_or_else(|| CliError::ServerNotConfigured(name.to_string()))?;
        ServerConfig::build(
            server_url,
            format!("http://127.0.0.1:{}/", self.callback_port()),
            normalize_text_option(self.consumer_key.clone())
                .unwrap_or_else(|| DEFAULT_CONSUMER_KEY.to_string()),
            normalize_text_option(self.consumer_secret.clone())
                .unwrap_or_else(|| DEFAULT_CONSUMER_SECRET.to_string()),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )
        .map_err(|error| CliError::Config(error.to_string()))
    }

    fn normalize(&mut self) {
        self.server_url = self
            .server_url()
            .map(|url| url.trim_end_matches('/').to_string());
        self.consumer_key = normalize_text_option(self.consumer_key.clone());
        self.consumer_secret = normalize_text_option(self.consumer_secret.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_profile_name_rejects_empty() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some(" ")), None);
        assert_eq!(normalize_profile_name(Some(" work ")), Some("work".to_string()));
    }

    #[test]
    fn config_roundtrip_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = CliProfilesConfig {
            version: 1,
            active_profile: Some(" default ".to_string()),
            profiles: BTreeMap::new(),
        };
        config.profiles.insert(
            "default".to_string(),
            CliProfile {
                server_url: Some(" https://notes.example.com/ ".to_string()),
                callback_port: Some(9555),
                consumer_key: Some("  ".to_string()),
                consumer_secret: None,
            },
        );

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("default"));
        let profile = loaded.profiles.get("default").unwrap();
        assert_eq!(profile.server_url.as_deref(), Some("https://notes.example.com"));
        assert_eq!(profile.callback_port, Some(9555));
        assert_eq!(profile.consumer_key, None);
    }

    #[test]
    fn missing_config_file_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CliProfilesConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn resolve_profile_name_prefers_explicit_then_env_then_active() {
        let config = CliProfilesConfig {
            version: 1,
            active_profile: Some("work".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(
            config.resolve_profile_name_with_env(Some("laptop"), Some("env")),
            "laptop"
        );
        assert_eq!(config.resolve_profile_name_with_env(None, Some("env")), "env");
        assert_eq!(config.resolve_profile_name_with_env(None, Some(" ")), "work");
        assert_eq!(
            CliProfilesConfig::default().resolve_profile_name_with_env(None, None),
            DEFAULT_PROFILE
        );
    }

    #[test]
    fn server_config_fills_defaults() {
        let profile = CliProfile {
            server_url: Some("https://notes.example.com".to_string()),
            ..CliProfile::default()
        };
        let config = profile.server_config("default").unwrap();
        assert_eq!(config.callback_url, "http://127.0.0.1:9001/");
        assert_eq!(config.consumer_key, DEFAULT_CONSUMER_KEY);

        assert!(matches!(
            CliProfile::default().server_config("empty"),
            Err(CliError::ServerNotConfigured(name)) if name == "empty"
        ));
    }
}
