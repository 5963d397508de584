//! Loopback listener that catches the OAuth redirect from the browser.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use notesync_core::oauth::{AuthorizationCallback, CallbackError};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use url::Url;

/// How long the browser gets to receive its page once the verifier arrived
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const AUTHORIZED_PAGE: &str =
    "<html><body><h1>notesync is authorized</h1><p>You can close this window.</p></body></html>";
const DENIED_PAGE: &str =
    "<html><body><h1>Authorization was not granted</h1><p>You can close this window.</p></body></html>";

/// What a redirect to the callback address carried
#[derive(Debug, PartialEq, Eq)]
pub enum Redirect {
    Verifier(String),
    Denied(String),
    /// No verifier and no denial, like a stray reload of the bare address
    Ignored,
}

/// Classify the query parameters of a request to the callback address
pub fn parse_redirect(query: &HashMap<String, String>) -> Redirect {
    if let Some(reason) = query.get("error").or_else(|| query.get("denied")) {
        return Redirect::Denied(reason.clone());
    }
    match query.get("oauth_verifier") {
        Some(verifier) => Redirect::Verifier(verifier.clone()),
        None => Redirect::Ignored,
    }
}

type RedirectSender = oneshot::Sender<Result<String, CallbackError>>;

#[derive(Clone)]
struct CallbackState {
    redirect: Arc<StdMutex<Option<RedirectSender>>>,
}

async fn receive_redirect(
    State(state): State<CallbackState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Html<&'static str>, StatusCode> {
    let (outcome, page) = match parse_redirect(&query) {
        Redirect::Verifier(verifier) => (Ok(verifier), AUTHORIZED_PAGE),
        Redirect::Denied(reason) => (Err(CallbackError::Denied(reason)), DENIED_PAGE),
        Redirect::Ignored => return Err(StatusCode::NOT_FOUND),
    };

    let sender = state
        .redirect
        .lock()
        .ok()
        .and_then(|mut slot| slot.take());
    match sender {
        Some(sender) => {
            let _ = sender.send(outcome);
        }
        None => tracing::debug!("Ignoring repeated authorization redirect"),
    }
    Ok(Html(page))
}

/// [`AuthorizationCallback`] that prints the authorization URL and waits for
/// the server to redirect the browser back to `127.0.0.1`
pub struct LoopbackCallback {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    timeout: Duration,
}

impl LoopbackCallback {
    /// Listen on `127.0.0.1:port`; port 0 picks a free one
    pub async fn bind(port: u16, timeout: Duration) -> io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            timeout,
        })
    }

    /// URL to hand the server as `oauth_callback`
    pub fn callback_url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }
}

#[async_trait]
impl AuthorizationCallback for LoopbackCallback {
    async fn authorize(&self, url: &Url) -> Result<String, CallbackError> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or_else(|| CallbackError::Failed("callback listener was already used".into()))?;

        println!("Open this URL in your browser to authorize notesync:\n\n  {url}\n");

        let (redirect_tx, redirect_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let router = Router::new()
            .route("/", get(receive_redirect))
            .with_state(CallbackState {
                redirect: Arc::new(StdMutex::new(Some(redirect_tx))),
            });
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    stop_rx.await.ok();
                })
                .await
        });

        let outcome = tokio::time::timeout(self.timeout, redirect_rx).await;

        let _ = stop_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Err(error))) => tracing::warn!("Callback listener failed: {error}"),
            Ok(_) => {}
            Err(_) => server.abort(),
        }

        match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CallbackError::Failed(
                "callback listener stopped before the redirect arrived".into(),
            )),
            Err(_) => Err(CallbackError::Timeout),
        }
    }
}
