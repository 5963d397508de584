//! OAuth endpoints of a Tomboy-compatible server

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::http::{api_root_url, get_json, post_for_text, resolve_ref};
use super::wire::ApiRoot;
use crate::oauth::signature::Signer;
use crate::oauth::{
    AccessToken, AuthorizationError, AuthorizationResult, ConsumerCredentials, OAuthToken,
    RequestToken, TokenEndpoint,
};

/// The three OAuth URLs advertised by the API root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthUrls {
    pub request_token: Url,
    pub authorize: Url,
    pub access_token: Url,
}

impl OAuthUrls {
    fn from_root(base: &Url, root: &ApiRoot) -> AuthorizationResult<Self> {
        Ok(Self {
            request_token: resolve_ref(base, &root.oauth_request_token_url)?,
            authorize: resolve_ref(base, &root.oauth_authorize_url)?,
            access_token: resolve_ref(base, &root.oauth_access_token_url)?,
        })
    }
}

/// [`TokenEndpoint`] over HTTP
pub struct WebTokenEndpoint {
    client: Client,
    consumer: ConsumerCredentials,
    urls: OAuthUrls,
}

impl WebTokenEndpoint {
    pub const fn new(client: Client, consumer: ConsumerCredentials, urls: OAuthUrls) -> Self {
        Self {
            client,
            consumer,
            urls,
        }
    }

    /// Read the OAuth URLs from the server's API root
    pub async fn discover(
        client: Client,
        server_url: &str,
        consumer: ConsumerCredentials,
    ) -> AuthorizationResult<Self> {
        let base = api_root_url(server_url)?;
        let root: ApiRoot = get_json(&client, None, &base).await?;
        let urls = OAuthUrls::from_root(&base, &root)?;
        tracing::debug!(
            "Discovered OAuth endpoints at {} (api-version {})",
            base,
            root.api_version.as_deref().unwrap_or("unknown")
        );
        Ok(Self::new(client, consumer, urls))
    }

    pub const fn urls(&self) -> &OAuthUrls {
        &self.urls
    }
}

fn parse_token_response(body: &str, step: &str) -> AuthorizationResult<OAuthToken> {
    OAuthToken::from_form(body).ok_or_else(|| {
        AuthorizationError::InvalidResponse(format!("{step} response did not include oauth_token"))
    })
}

#[async_trait]
impl TokenEndpoint for WebTokenEndpoint {
    async fn request_token(&self, callback_url: &str) -> AuthorizationResult<RequestToken> {
        let body = post_for_text(
            &self.client,
            Signer::new(&self.consumer, None),
            &self.urls.request_token,
            &[("oauth_callback", callback_url)],
        )
        .await?;
        parse_token_response(&body, "request token").map(RequestToken::new)
    }

    fn authorization_url(
        &self,
        request_token: &RequestToken,
        callback_url: &str,
    ) -> AuthorizationResult<Url> {
        let mut url = self.urls.authorize.clone();
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
        let body = post_for_text(
            &self.client,
            Signer::new(&self.consumer, Some(request_token.as_oauth())),
            &self.urls.access_token,
            &[("oauth_verifier", verifier)],
        )
        .await?;
        parse_token_response(&body, "access token").map(AccessToken::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> WebTokenEndpoint {
        let base = Url::parse("https://notes.example.com/api/1.0/").unwrap();
        let root = ApiRoot {
            oauth_request_token_url: "https://notes.example.com/oauth/request_token".into(),
            oauth_authorize_url: "/oauth/authorize/".into(),
            oauth_access_token_url: "https://notes.example.com/oauth/access_token".into(),
            api_version: Some("1.0".into()),
            user_ref: None,
        };
        WebTokenEndpoint::new(
            Client::new(),
            ConsumerCredentials::default(),
            OAuthUrls::from_root(&base, &root).unwrap(),
        )
    }

    #[test]
    fn relative_oauth_urls_resolve_against_the_api_root() {
        assert_eq!(
            endpoint().urls().authorize.as_str(),
            "https://notes.example.com/oauth/authorize/"
        );
    }

    #[test]
    fn authorization_url_embeds_token_and_callback() {
        let token = RequestToken::new(OAuthToken::new("req token", "secret"));
        let url = endpoint()
            .authorization_url(&token, "http://127.0.0.1:9001/")
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("oauth_token".to_string(), "req token".to_string()),
                (
                    "oauth_callback".to_string(),
                    "http://127.0.0.1:9001/".to_string()
                ),
            ]
        );
        assert!(!url.as_str().contains("secret"));
    }

    #[test]
    fn token_response_without_token_is_invalid() {
        assert!(matches!(
            parse_token_response("error=nope", "request token"),
            Err(AuthorizationError::InvalidResponse(_))
        ));
    }
}
