//! Handshake errors

use thiserror::Error;

use super::handshake::HandshakeState;
use super::signature::SignatureError;
use crate::transport::TransportError;

/// Why the authorization handshake did not produce an access token
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Timed out waiting for the user to authorize access")]
    AuthorizationTimeout,

    #[error("Authorization transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Cannot {attempted} while the handshake is {state}")]
    InvalidState {
        state: HandshakeState,
        attempted: &'static str,
    },

    #[error("Invalid authorization response: {0}")]
    InvalidResponse(String),

    #[error("Invalid authorization configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<SignatureError> for AuthorizationError {
    fn from(error: SignatureError) -> Self {
        Self::InvalidConfiguration(error.to_string())
    }
}

impl From<CallbackError> for AuthorizationError {
    fn from(error: CallbackError) -> Self {
        match error {
            CallbackError::Timeout => Self::AuthorizationTimeout,
            CallbackError::Denied(reason) | CallbackError::Failed(reason) => {
                Self::AuthorizationDenied(reason)
            }
        }
    }
}

pub type AuthorizationResult<T> = Result<T, AuthorizationError>;

/// Failure reported by an authorization callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    /// The embedder gave up waiting for the user
    #[error("timed out waiting for the verifier")]
    Timeout,

    /// The user or the server refused access
    #[error("access denied: {0}")]
    Denied(String),

    /// The callback itself broke
    #[error("callback failed: {0}")]
    Failed(String),
}
