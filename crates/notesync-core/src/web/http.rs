//! Signed HTTP calls shared by the token endpoint and the sync server

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::oauth::signature::Signer;
use crate::transport::TransportError;

/// Location of the API root for a server URL
///
/// Accepts both the bare server address and one already pointing at `/api/1.0`.
pub fn api_root_url(server_url: &str) -> Result<Url, TransportError> {
    let trimmed = server_url.trim().trim_end_matches('/');
    let root = if trimmed.ends_with("/api/1.0") {
        format!("{trimmed}/")
    } else {
        format!("{trimmed}/api/1.0/")
    };
    Url::parse(&root)
        .map_err(|error| TransportError::protocol(format!("invalid server URL '{server_url}': {error}")))
}

/// Resolve a reference the server handed out, absolute or relative to `base`
pub fn resolve_ref(base: &Url, reference: &str) -> Result<Url, TransportError> {
    base.join(reference.trim())
        .map_err(|error| TransportError::protocol(format!("invalid API reference '{reference}': {error}")))
}

async fn send(
    client: &Client,
    signer: Option<Signer<'_>>,
    method: Method,
    url: &Url,
    extra: &[(&str, &str)],
    body: Option<serde_json::Value>,
) -> Result<Response, TransportError> {
    let mut request = client
        .request(method.clone(), url.clone())
        .header(ACCEPT, "application/json");

    if let Some(signer) = signer {
        let header = signer
            .authorization_header(method.as_str(), url, extra)
            .map_err(|error| TransportError::protocol(error.to_string()))?;
        request = request.header(AUTHORIZATION, header);
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    tracing::debug!("{method} {url}");
    let response = request.send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::from_status(status, &body));
    }
    Ok(response)
}

/// GET a JSON document
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    signer: Option<Signer<'_>>,
    url: &Url,
) -> Result<T, TransportError> {
    let response = send(client, signer, Method::GET, url, &[], None).await?;
    decode_json(response).await
}

/// PUT a JSON body and decode the JSON reply
pub async fn put_json<B: Serialize, T: DeserializeOwned>(
    client: &Client,
    signer: Signer<'_>,
    url: &Url,
    body: &B,
) -> Result<T, TransportError> {
    let body = serde_json::to_value(body)
        .map_err(|error| TransportError::protocol(format!("cannot encode request: {error}")))?;
    let response = send(client, Some(signer), Method::PUT, url, &[], Some(body)).await?;
    decode_json(response).await
}

/// POST with no body and return the raw text reply (token endpoints answer form-encoded)
pub async fn post_for_text(
    client: &Client,
    signer: Signer<'_>,
    url: &Url,
    extra: &[(&str, &str)],
) -> Result<String, TransportError> {
    let response = send(client, Some(signer), Method::POST, url, extra, None).await?;
    Ok(response.text().await?)
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let url = response.url().clone();
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|error| TransportError::protocol(format!("unexpected response from {url}: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_root_is_derived_from_server_url() {
        assert_eq!(
            api_root_url("https://notes.example.com/").unwrap().as_str(),
            "https://notes.example.com/api/1.0/"
        );
        assert_eq!(
            api_root_url("https://notes.example.com/api/1.0").unwrap().as_str(),
            "https://notes.example.com/api/1.0/"
        );
        assert!(api_root_url("not a url").is_err());
    }

    #[test]
    fn refs_resolve_against_the_base() {
        let base = api_root_url("https://notes.example.com").unwrap();
        assert_eq!(
            resolve_ref(&base, "/api/1.0/alice/notes/").unwrap().as_str(),
            "https://notes.example.com/api/1.0/alice/notes/"
        );
        assert_eq!(
            resolve_ref(&base, "https://other.example.com/x").unwrap().as_str(),
            "https://other.example.com/x"
        );
    }
}
