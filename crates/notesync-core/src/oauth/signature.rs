//! OAuth 1.0a HMAC-SHA1 request signing (RFC 5849)

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;
use thiserror::Error;
use url::Url;

use super::token::{ConsumerCredentials, OAuthToken};

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";
const NONCE_LENGTH: usize = 32;

/// The signing key could not be used
#[derive(Debug, Clone, Error)]
#[error("Could not sign request: {0}")]
pub struct SignatureError(String);

/// RFC 3986 percent-encoding: everything except `A-Z a-z 0-9 - . _ ~`
pub fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Scheme, authority and path of a request URL, without query or fragment
fn normalized_url(url: &Url) -> String {
    let scheme = url.scheme().to_ascii_lowercase();
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let port = url.port().map(|port| format!(":{port}")).unwrap_or_default();
    format!("{scheme}://{host}{port}{}", url.path())
}

/// Signature base string: `METHOD&enc(url)&enc(sorted params)`
///
/// Query parameters of `url` are folded into `params` before sorting.
pub fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (percent_encode(&key), percent_encode(&value)))
        .chain(
            params
                .iter()
                .map(|(key, value)| (percent_encode(key), percent_encode(value))),
        )
        .collect();
    encoded.sort();

    let normalized_params = encoded
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(&normalized_url(url)),
        percent_encode(&normalized_params)
    )
}

/// HMAC-SHA1 of the base string, base64 encoded
pub fn sign(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String, SignatureError> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|error| SignatureError(error.to_string()))?;
    mac.update(base_string.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

/// Signs requests for one consumer and, once obtained, one token
#[derive(Debug, Clone, Copy)]
pub struct Signer<'a> {
    consumer: &'a ConsumerCredentials,
    token: Option<&'a OAuthToken>,
}

impl<'a> Signer<'a> {
    pub const fn new(consumer: &'a ConsumerCredentials, token: Option<&'a OAuthToken>) -> Self {
        Self { consumer, token }
    }

    /// `Authorization` header value for a request with a fresh nonce and timestamp
    ///
    /// `extra` carries protocol parameters such as `oauth_callback` or
    /// `oauth_verifier`; they are signed and sent in the header.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, &str)],
    ) -> Result<String, SignatureError> {
        self.authorization_header_at(
            method,
            url,
            extra,
            &generate_nonce(),
            chrono::Utc::now().timestamp(),
        )
    }

    /// Same as [`Signer::authorization_header`] with a fixed nonce and timestamp
    pub fn authorization_header_at(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<String, SignatureError> {
        let params = self.oauth_params(method, url, extra, nonce, timestamp)?;
        let fields = params
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {fields}"))
    }

    /// Every `oauth_*` parameter of the request, `oauth_signature` included
    pub fn oauth_params(
        &self,
        method: &str,
        url: &Url,
        extra: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<Vec<(String, String)>, SignatureError> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer.key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            (
                "oauth_signature_method".to_string(),
                SIGNATURE_METHOD.to_string(),
            ),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_version".to_string(), OAUTH_VERSION.to_string()),
        ];
        if let Some(token) = self.token {
            params.push(("oauth_token".to_string(), token.token.clone()));
        }
        params.extend(
            extra
                .iter()
                .map(|(key, value)| ((*key).to_string(), (*value).to_string())),
        );

        let base_string = signature_base_string(method, url, &params);
        let token_secret = self.token.map(|token| token.secret.as_str()).unwrap_or("");
        let signature = sign(&base_string, &self.consumer.secret, token_secret)?;
        params.push(("oauth_signature".to_string(), signature));
        params.sort();
        Ok(params)
    }
}
