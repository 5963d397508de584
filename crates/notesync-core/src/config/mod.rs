//! Server connection configuration.
//!
//! Provides a validated `ServerConfig` shared by the handshake and the web
//! sync transport, plus the one place the HTTP client is built.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::oauth::ConsumerCredentials;
use crate::transport::TransportError;

/// Request timeout used when none is configured
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
/// Loopback address the CLI listens on for the OAuth redirect by default
pub const DEFAULT_CALLBACK_URL: &str = "http://127.0.0.1:9001/";

const USER_AGENT: &str = concat!("notesync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid server configuration: {0}")]
pub struct ConfigError(String);

/// Everything needed to talk to one sync server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub server_url: String,
    pub callback_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

const fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl ServerConfig {
    /// Config for `server_url` with the default callback and consumer
    pub fn new(server_url: impl Into<String>) -> Result<Self, ConfigError> {
        let consumer = ConsumerCredentials::default();
        Self::build(
            server_url.into(),
            DEFAULT_CALLBACK_URL.to_string(),
            consumer.key,
            consumer.secret,
            DEFAULT_HTTP_TIMEOUT_SECS,
        )
    }

    /// Validate and normalize every field
    pub fn build(
        server_url: String,
        callback_url: String,
        consumer_key: String,
        consumer_secret: String,
        http_timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let server_url = normalize_required_http_url(server_url, "server_url")?;
        let callback_url = normalize_required_value(callback_url, "callback_url")?;
        if !is_http_url(&callback_url) {
            return Err(ConfigError(
                "callback_url must include http:// or https://".to_string(),
            ));
        }
        let consumer_key = normalize_required_value(consumer_key, "consumer_key")?;
        let consumer_secret = normalize_required_value(consumer_secret, "consumer_secret")?;
        if http_timeout_secs == 0 {
            return Err(ConfigError(
                "http_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server_url,
            callback_url,
            consumer_key,
            consumer_secret,
            http_timeout_secs,
        })
    }

    /// Replace the callback URL, keeping the other fields
    pub fn with_callback_url(self, callback_url: impl Into<String>) -> Result<Self, ConfigError> {
        Self::build(
            self.server_url,
            callback_url.into(),
            self.consumer_key,
            self.consumer_secret,
            self.http_timeout_secs,
        )
    }

    pub fn consumer(&self) -> ConsumerCredentials {
        ConsumerCredentials::new(&self.consumer_key, &self.consumer_secret)
    }

    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// HTTP client for this server. Certificates are always verified.
    pub fn http_client(&self) -> Result<reqwest::Client, TransportError> {
        build_http_client(self.http_timeout())
    }
}

/// Shared reqwest client: rustls with bundled web PKI roots, fixed timeout
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(TransportError::from)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn normalize_required_value(raw: String, field: &str) -> Result<String, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        Err(ConfigError(format!("{field} is required")))
    } else {
        Ok(value.to_string())
    }
}

fn normalize_required_http_url(raw: String, field: &str) -> Result<String, ConfigError> {
    let value = normalize_required_value(raw, field)?;
    if is_http_url(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError(format!(
            "{field} must include http:// or https://"
        )))
    }
}
