//! Three-legged OAuth 1.0a handshake as an explicit state machine

use std::fmt;

use async_trait::async_trait;
use url::Url;

use super::callback::AuthorizationCallback;
use super::error::{AuthorizationError, AuthorizationResult};
use super::token::{AccessToken, RequestToken};

/// Where a [`Handshake`] currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Unauthenticated,
    RequestTokenObtained,
    AwaitingUserGrant,
    VerifierReceived,
    AccessTokenObtained,
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::RequestTokenObtained => "holding a request token",
            Self::AwaitingUserGrant => "awaiting the user grant",
            Self::VerifierReceived => "holding a verifier",
            Self::AccessTokenObtained => "complete",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Server side of the handshake: the three OAuth endpoints
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Obtain an unauthorized request token
    async fn request_token(&self, callback_url: &str) -> AuthorizationResult<RequestToken>;

    /// URL the user visits to grant access to `request_token`
    fn authorization_url(
        &self,
        request_token: &RequestToken,
        callback_url: &str,
    ) -> AuthorizationResult<Url>;

    /// Trade the authorized request token and verifier for an access token
    async fn access_token(
        &self,
        request_token: &RequestToken,
        verifier: &str,
    ) -> AuthorizationResult<AccessToken>;
}

/// One run of the authorization handshake
///
/// Each step only succeeds from the state before it. A failing step leaves the
/// handshake in [`HandshakeState::Failed`]; calling a step out of order is
/// rejected and changes nothing.
pub struct Handshake<E> {
    endpoint: E,
    callback_url: String,
    state: HandshakeState,
    request_token: Option<RequestToken>,
    verifier: Option<String>,
}

impl<E: TokenEndpoint> Handshake<E> {
    pub fn new(endpoint: E, callback_url: impl Into<String>) -> Self {
        Self {
            endpoint,
            callback_url: callback_url.into(),
            state: HandshakeState::Unauthenticated,
            request_token: None,
            verifier: None,
        }
    }

    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Step 1: obtain an unauthorized request token
    pub async fn request_token(&mut self) -> AuthorizationResult<()> {
        self.require(HandshakeState::Unauthenticated, "request a token")?;

        let result = self.endpoint.request_token(&self.callback_url).await;
        let token = self.track(result)?;
        tracing::debug!("Obtained OAuth request token");
        self.request_token = Some(token);
        self.state = HandshakeState::RequestTokenObtained;
        Ok(())
    }

    /// Step 2: build the URL the user has to visit
    pub fn authorization_url(&mut self) -> AuthorizationResult<Url> {
        self.require(
            HandshakeState::RequestTokenObtained,
            "build the authorization URL",
        )?;

        let result = match &self.request_token {
            Some(token) => self.endpoint.authorization_url(token, &self.callback_url),
            None => Err(AuthorizationError::InvalidResponse(
                "request token missing".into(),
            )),
        };
        let url = self.track(result)?;
        self.state = HandshakeState::AwaitingUserGrant;
        Ok(url)
    }

    /// Step 3: accept the verifier the user brought back
    ///
    /// An empty verifier means the grant did not happen.
    pub fn receive_verifier(&mut self, verifier: &str) -> AuthorizationResult<()> {
        self.require(HandshakeState::AwaitingUserGrant, "accept a verifier")?;

        let verifier = verifier.trim();
        if verifier.is_empty() {
            self.state = HandshakeState::Failed;
            return Err(AuthorizationError::AuthorizationDenied(
                "no verifier was returned".into(),
            ));
        }

        self.verifier = Some(verifier.to_string());
        self.state = HandshakeState::VerifierReceived;
        Ok(())
    }

    /// Step 4: exchange request token and verifier for the access token
    pub async fn exchange_verifier(&mut self) -> AuthorizationResult<AccessToken> {
        self.require(HandshakeState::VerifierReceived, "exchange the verifier")?;

        let result = match (&self.request_token, &self.verifier) {
            (Some(token), Some(verifier)) => self.endpoint.access_token(token, verifier).await,
            _ => Err(AuthorizationError::InvalidResponse(
                "request token or verifier missing".into(),
            )),
        };
        let access_token = self.track(result)?;

        self.request_token = None;
        self.verifier = None;
        self.state = HandshakeState::AccessTokenObtained;
        tracing::info!("OAuth handshake completed");
        Ok(access_token)
    }

    /// Drive all four steps, suspending on `callback` for the user grant
    pub async fn run<C>(&mut self, callback: &C) -> AuthorizationResult<AccessToken>
    where
        C: AuthorizationCallback + ?Sized,
    {
        self.request_token().await?;
        let url = self.authorization_url()?;

        tracing::info!("Waiting for the user to authorize access");
        let verifier = match callback.authorize(&url).await {
            Ok(verifier) => verifier,
            Err(error) => {
                self.state = HandshakeState::Failed;
                return Err(error.into());
            }
        };

        self.receive_verifier(&verifier)?;
        self.exchange_verifier().await
    }

    fn require(&self, expected: HandshakeState, attempted: &'static str) -> AuthorizationResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AuthorizationError::InvalidState {
                state: self.state,
                attempted,
            })
        }
    }

    fn track<T>(&mut self, result: AuthorizationResult<T>) -> AuthorizationResult<T> {
        if let Err(error) = &result {
            tracing::warn!("OAuth handshake failed while {}: {error}", self.state);
            self.state = HandshakeState::Failed;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{CallbackError, OAuthToken};
    use crate::transport::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeEndpoint {
        fail_request: bool,
        exchanges: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TokenEndpoint for FakeEndpoint {
        async fn request_token(&self, callback_url: &str) -> AuthorizationResult<RequestToken> {
            if self.fail_request {
                return Err(TransportError::network("connection refused").into());
            }
            assert_eq!(callback_url, "http://127.0.0.1:9001/");
            Ok(RequestToken::new(OAuthToken::new("req", "req-secret")))
        }

        fn authorization_url(
            &self,
            request_token: &RequestToken,
            callback_url: &str,
        ) -> AuthorizationResult<Url> {
            let mut url = Url::parse("https://notes.example.com/oauth/authorize/")
                .map_err(|error| AuthorizationError::InvalidConfiguration(error.to_string()))?;
            url.query_pairs_mut()
                .append_pair("oauth_token", &request_token.as_oauth().token)
                .append_pair("oauth_callback", callback_url);
            Ok(url)
        }

        async fn access_token(
            &self,
            request_token: &RequestToken,
            verifier: &str,
        ) -> AuthorizationResult<AccessToken> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request_token.as_oauth().token, "req");
            Ok(AccessToken::new(format!("access-{verifier}"), "access-secret"))
        }
    }

    fn handshake(endpoint: FakeEndpoint) -> Handshake<FakeEndpoint> {
        Handshake::new(endpoint, "http://127.0.0.1:9001/")
    }

    #[tokio::test]
    async fn run_walks_every_state_to_an_access_token() {
        let mut handshake = handshake(FakeEndpoint::default());
        let callback = |url: &Url| -> Result<String, CallbackError> {
            assert!(url.as_str().contains("oauth_token=req"));
            Ok(" v123 ".to_string())
        };

        let token = handshake.run(&callback).await.unwrap();
        assert_eq!(token.as_oauth().token, "access-v123");
        assert_eq!(handshake.state(), HandshakeState::AccessTokenObtained);
    }

    #[tokio::test]
    async fn empty_verifier_is_denied_without_exchanging() {
        let exchanges = Arc::new(AtomicUsize::new(0));
        let mut handshake = handshake(FakeEndpoint {
            exchanges: Arc::clone(&exchanges),
            ..FakeEndpoint::default()
        });
        let callback = |_: &Url| -> Result<String, CallbackError> { Ok(String::new()) };

        let result = handshake.run(&callback).await;
        assert!(matches!(
            result,
            Err(AuthorizationError::AuthorizationDenied(_))
        ));
        assert_eq!(handshake.state(), HandshakeState::Failed);
        assert_eq!(exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn callback_timeout_surfaces_as_authorization_timeout() {
        let mut handshake = handshake(FakeEndpoint::default());
        let callback = |_: &Url| -> Result<String, CallbackError> { Err(CallbackError::Timeout) };

        let result = handshake.run(&callback).await;
        assert!(matches!(result, Err(AuthorizationError::AuthorizationTimeout)));
        assert_eq!(handshake.state(), HandshakeState::Failed);
    }

    #[tokio::test]
    async fn transport_failure_moves_to_failed() {
        let mut handshake = handshake(FakeEndpoint {
            fail_request: true,
            ..FakeEndpoint::default()
        });

        let result = handshake.request_token().await;
        assert!(matches!(result, Err(AuthorizationError::Transport(_))));
        assert_eq!(handshake.state(), HandshakeState::Failed);

        // A failed handshake cannot be resumed
        assert!(matches!(
            handshake.authorization_url(),
            Err(AuthorizationError::InvalidState {
                state: HandshakeState::Failed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn out_of_order_steps_are_rejected() {
        let mut handshake = handshake(FakeEndpoint::default());

        assert!(matches!(
            handshake.exchange_verifier().await,
            Err(AuthorizationError::InvalidState { .. })
        ));
        assert!(handshake.receive_verifier("v").is_err());
        assert_eq!(handshake.state(), HandshakeState::Unauthenticated);

        handshake.request_token().await.unwrap();
        assert!(matches!(
            handshake.request_token().await,
            Err(AuthorizationError::InvalidState { .. })
        ));
        assert_eq!(handshake.state(), HandshakeState::RequestTokenObtained);
    }

    #[tokio::test]
    async fn steps_can_be_driven_one_by_one() {
        let mut handshake = handshake(FakeEndpoint::default());

        handshake.request_token().await.unwrap();
        let url = handshake.authorization_url().unwrap();
        assert_eq!(handshake.state(), HandshakeState::AwaitingUserGrant);
        assert_eq!(url.host_str(), Some("notes.example.com"));

        handshake.receive_verifier("abc").unwrap();
        assert_eq!(handshake.state(), HandshakeState::VerifierReceived);

        let token = handshake.exchange_verifier().await.unwrap();
        assert_eq!(token.as_oauth().token, "access-abc");
    }
}
