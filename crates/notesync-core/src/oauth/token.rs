//! OAuth credential types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Consumer key used by Tomboy-compatible servers for third-party clients
pub const DEFAULT_CONSUMER_KEY: &str = "anyone";
/// Consumer secret paired with [`DEFAULT_CONSUMER_KEY`]
pub const DEFAULT_CONSUMER_SECRET: &str = "anyone";

/// A token identifier and the secret used to sign requests with it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub token: String,
    pub secret: String,
}

impl OAuthToken {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }

    /// Parse an `oauth_token=..&oauth_token_secret=..` form body
    pub fn from_form(body: &str) -> Option<Self> {
        let mut token = None;
        let mut secret = None;
        for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            match key.as_ref() {
                "oauth_token" => token = Some(value.into_owned()),
                "oauth_token_secret" => secret = Some(value.into_owned()),
                _ => {}
            }
        }

        let token = token.filter(|value| !value.is_empty())?;
        Some(Self::new(token, secret.unwrap_or_default()))
    }
}

impl fmt::Debug for OAuthToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OAuthToken")
            .field("token", &self.token)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Short-lived token that only exists during a handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken(OAuthToken);

impl RequestToken {
    pub const fn new(token: OAuthToken) -> Self {
        Self(token)
    }

    pub const fn as_oauth(&self) -> &OAuthToken {
        &self.0
    }
}

/// Long-lived credential produced by the handshake
///
/// Callers persist it and hand it to every later sync; running the handshake
/// again for each sync is not how it is meant to be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(OAuthToken);

impl AccessToken {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self(OAuthToken::new(token, secret))
    }

    pub const fn as_oauth(&self) -> &OAuthToken {
        &self.0
    }
}

impl From<OAuthToken> for AccessToken {
    fn from(token: OAuthToken) -> Self {
        Self(token)
    }
}

/// Application credentials sent with every signed request
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

impl ConsumerCredentials {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }
}

impl Default for ConsumerCredentials {
    fn default() -> Self {
        Self::new(DEFAULT_CONSUMER_KEY, DEFAULT_CONSUMER_SECRET)
    }
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConsumerCredentials")
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_debug_redacts_secret() {
        let token = AccessToken::new("public-id", "very-secret");
        let debug = format!("{token:?}");
        assert!(debug.contains("public-id"));
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parses_form_encoded_token_response() {
        let token = OAuthToken::from_form("oauth_token=abc%20d&oauth_token_secret=s3cr%26t&x=1\n")
            .unwrap();
        assert_eq!(token.token, "abc d");
        assert_eq!(token.secret, "s3cr&t");
    }

    #[test]
    fn form_without_token_is_rejected() {
        assert!(OAuthToken::from_form("oauth_token_secret=abc").is_none());
        assert!(OAuthToken::from_form("oauth_token=&oauth_token_secret=abc").is_none());
    }

    #[test]
    fn access_token_serializes_as_plain_pair() {
        let token = AccessToken::new("t", "s");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, r#"{"token":"t","secret":"s"}"#);
        let back: AccessToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }

    #[test]
    fn default_consumer_is_anyone() {
        let consumer = ConsumerCredentials::default();
        assert_eq!(consumer.key, "anyone");
        assert_eq!(consumer.secret, "anyone");
    }
}
