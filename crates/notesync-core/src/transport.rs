//! Errors raised by the remote transport

use std::error::Error as StdError;
use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

const MAX_ERROR_BODY_CHARS: usize = 180;

/// Broad class of a transport failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection could not be made or was dropped
    Network,
    /// Certificate validation or TLS negotiation failed
    Tls,
    /// The request took too long
    Timeout,
    /// The server rejected the credentials
    Unauthorized,
    /// Any other non-success HTTP status
    Status(u16),
    /// Another writer changed the server between our read and our write
    RevisionMismatch,
    /// The server answered with something we could not understand
    Protocol,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network error"),
            Self::Tls => f.write_str("TLS error"),
            Self::Timeout => f.write_str("request timed out"),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::Status(code) => write!(f, "HTTP {code}"),
            Self::RevisionMismatch => f.write_str("revision mismatch"),
            Self::Protocol => f.write_str("protocol error"),
        }
    }
}

/// A failed call to the remote server. Never retried by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Build an error of the given kind
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`TransportErrorKind::Protocol`] error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Protocol, message)
    }

    /// Shorthand for a [`TransportErrorKind::Network`] error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    /// Classify a non-success HTTP response
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = parse_api_error(status, body);
        let kind = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportErrorKind::Unauthorized,
            StatusCode::CONFLICT => TransportErrorKind::RevisionMismatch,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                TransportErrorKind::Timeout
            }
            other => TransportErrorKind::Status(other.as_u16()),
        };
        Self::new(kind, message)
    }

    /// Failure class
    pub const fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// Human-readable detail
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if is_tls_failure(&error) {
            TransportErrorKind::Tls
        } else if error.is_decode() || error.is_builder() {
            TransportErrorKind::Protocol
        } else if let Some(status) = error.status() {
            return Self::from_status(status, "");
        } else {
            TransportErrorKind::Network
        };
        Self::new(kind, error_chain(&error))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect::<String>();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_tls_failure(error: &(dyn StdError + 'static)) -> bool {
    let chain = error_chain(error).to_ascii_lowercase();
    chain.contains("certificate") || chain.contains("tls") || chain.contains("handshake")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_statuses() {
        assert_eq!(
            TransportError::from_status(StatusCode::UNAUTHORIZED, "").kind(),
            TransportErrorKind::Unauthorized
        );
        assert_eq!(
            TransportError::from_status(StatusCode::CONFLICT, "").kind(),
            TransportErrorKind::RevisionMismatch
        );
        assert_eq!(
            TransportError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "").kind(),
            TransportErrorKind::Status(500)
        );
    }

    #[test]
    fn parse_api_error_prefers_json_message() {
        let error = TransportError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"message":" bad revision "}"#,
        );
        assert_eq!(error.message(), "bad revision (400)");
    }

    #[test]
    fn parse_api_error_falls_back_to_status() {
        let error = TransportError::from_status(StatusCode::BAD_GATEWAY, "   ");
        assert_eq!(error.message(), "HTTP 502");
        assert_eq!(error.to_string(), "HTTP 502: HTTP 502");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let error = TransportError::from_status(StatusCode::BAD_GATEWAY, &"x".repeat(400));
        assert_eq!(error.message(), format!("{} (502)", "x".repeat(180)));
    }
}
