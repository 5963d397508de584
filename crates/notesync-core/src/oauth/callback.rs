//! Ways for an embedder to hand the verifier back to the handshake

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use super::error::CallbackError;

/// The one point where the handshake waits on a human
///
/// Implementations show `url` to the user and resolve once the server has
/// redirected back with a verifier, or fail with [`CallbackError`]. Timeouts
/// are the implementation's responsibility.
#[async_trait]
pub trait AuthorizationCallback: Send + Sync {
    async fn authorize(&self, url: &Url) -> Result<String, CallbackError>;
}

/// Plain closures are called inline on the handshake's task
#[async_trait]
impl<F> AuthorizationCallback for F
where
    F: Fn(&Url) -> Result<String, CallbackError> + Send + Sync,
{
    async fn authorize(&self, url: &Url) -> Result<String, CallbackError> {
        self(url)
    }
}

/// Runs a blocking closure (browser launch plus a synchronous socket wait,
/// a terminal prompt) on tokio's blocking pool
pub struct BlockingCallback<F> {
    callback: Arc<F>,
}

impl<F> BlockingCallback<F>
where
    F: Fn(&Url) -> Result<String, CallbackError> + Send + Sync + 'static,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

#[async_trait]
impl<F> AuthorizationCallback for BlockingCallback<F>
where
    F: Fn(&Url) -> Result<String, CallbackError> + Send + Sync + 'static,
{
    async fn authorize(&self, url: &Url) -> Result<String, CallbackError> {
        let callback = Arc::clone(&self.callback);
        let url = url.clone();
        tokio::task::spawn_blocking(move || callback(&url))
            .await
            .map_err(|error| CallbackError::Failed(error.to_string()))?
    }
}

/// An authorization URL waiting for another task to supply the verifier
#[derive(Debug)]
pub struct AuthorizationRequest {
    url: Url,
    responder: oneshot::Sender<Result<String, CallbackError>>,
}

impl AuthorizationRequest {
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Resume the handshake with a verifier or a failure
    pub fn respond(self, verifier: Result<String, CallbackError>) {
        if self.responder.send(verifier).is_err() {
            tracing::debug!("Handshake stopped waiting before the verifier arrived");
        }
    }
}

/// Forwards the authorization URL over a channel and awaits the reply
///
/// Suits UIs whose event loop owns the user interaction.
#[derive(Debug, Clone)]
pub struct ChannelCallback {
    requests: mpsc::Sender<AuthorizationRequest>,
}

impl ChannelCallback {
    /// Callback plus the receiving end the UI side listens on
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<AuthorizationRequest>) {
        let (requests, receiver) = mpsc::channel(buffer.max(1));
        (Self { requests }, receiver)
    }
}

#[async_trait]
impl AuthorizationCallback for ChannelCallback {
    async fn authorize(&self, url: &Url) -> Result<String, CallbackError> {
        let (responder, response) = oneshot::channel();
        self.requests
            .send(AuthorizationRequest {
                url: url.clone(),
                responder,
            })
            .await
            .map_err(|_| CallbackError::Failed("nobody is listening for authorization requests".into()))?;

        response.await.map_err(|_| {
            CallbackError::Failed("authorization request was dropped without a reply".into())
        })?
    }
}
