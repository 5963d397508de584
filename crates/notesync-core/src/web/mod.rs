//! HTTP side of the Tomboy REST API

mod http;
mod server;
mod token_endpoint;
pub mod wire;

pub use http::api_root_url;
pub use server::WebSyncServer;
pub use token_endpoint::{OAuthUrls, WebTokenEndpoint};
