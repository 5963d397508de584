//! OAuth 1.0a authorization against a Tomboy-compatible server

mod callback;
mod error;
mod handshake;
pub mod signature;
mod token;

pub use callback::{AuthorizationCallback, AuthorizationRequest, BlockingCallback, ChannelCallback};
pub use error::{AuthorizationError, AuthorizationResult, CallbackError};
pub use handshake::{Handshake, HandshakeState, TokenEndpoint};
pub use token::{
    AccessToken, ConsumerCredentials, OAuthToken, RequestToken, DEFAULT_CONSUMER_KEY,
    DEFAULT_CONSUMER_SECRET,
};

use crate::config::ServerConfig;
use crate::web::WebTokenEndpoint;

/// Run the whole handshake against `config`'s server and return the access token
///
/// `callback` is asked to send the user to the authorization page and to bring
/// the verifier back.
pub async fn perform_handshake<C>(
    config: &ServerConfig,
    callback: &C,
) -> AuthorizationResult<AccessToken>
where
    C: AuthorizationCallback + ?Sized,
{
    let client = config.http_client()?;
    let endpoint =
        WebTokenEndpoint::discover(client, &config.server_url, config.consumer()).await?;
    let mut handshake = Handshake::new(endpoint, &config.callback_url);
    let token = handshake.run(callback).await?;
    tracing::info!("Authorized against {}", config.server_url);
    Ok(token)
}
