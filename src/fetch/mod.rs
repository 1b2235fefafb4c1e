//! Authenticated JSON fetching with response-shape validation.
//!
//! One logical GET per call: resolve the credential, attach per-scheme
//! headers, classify the response, and retry through the auth chain on
//! 401/403 until either the request succeeds or the chain is exhausted.

pub mod download;
pub mod html;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::auth::{AuthResolver, ResolvedAuth, MAX_AUTH_ATTEMPTS};
use crate::error::{BhError, Result};

pub use download::{Downloader, TrustDomains, MAX_REDIRECTS};

/// Sent on every outbound request.
pub const BH_USER_AGENT: &str = concat!("bh-cli/", env!("CARGO_PKG_VERSION"));

/// Default deadline for any single network call.
///
/// The socket default would block a logical operation indefinitely; 30s
/// matches the slowest provider listing endpoints we talk to.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How the resolved token is attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>` (GitHub API family)
    Bearer,
    /// `PRIVATE-TOKEN: <token>` (GitLab API family)
    PrivateToken,
}

impl AuthScheme {
    pub fn apply(self, request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
        match self {
            AuthScheme::Bearer => request.bearer_auth(token),
            AuthScheme::PrivateToken => request.header("PRIVATE-TOKEN", token),
        }
    }

    /// Accept header for API listing requests.
    pub fn accept(self) -> &'static str {
        match self {
            AuthScheme::Bearer => "application/vnd.github+json",
            AuthScheme::PrivateToken => "application/json",
        }
    }
}

/// Build the shared HTTP client.
///
/// Redirects are disabled: API calls should never redirect silently, and
/// the download path owns redirect policy (depth bound, credential gating)
/// explicitly.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|err| BhError::Config(format!("HTTP client error: {err}")))
}

/// One logical GET against an API endpoint, with retry-on-auth-failure.
pub struct Fetcher {
    client: reqwest::Client,
    auth: Arc<AuthResolver>,
    scheme: AuthScheme,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, auth: Arc<AuthResolver>, scheme: AuthScheme) -> Self {
        Self {
            client,
            auth,
            scheme,
        }
    }

    pub fn auth(&self) -> &Arc<AuthResolver> {
        &self.auth
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// 401/403 responses invalidate the cached credential and retry, letting
    /// the chain fall through explicit, session, and CLI providers without
    /// caller involvement. Network-level errors are never retried here.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let mut retries = 0usize;
        loop {
            let auth = self.auth.resolve().await;
            let mut request = self
                .client
                .get(url)
                .header(USER_AGENT, BH_USER_AGENT)
                .header(ACCEPT, self.scheme.accept());
            if let Some(token) = auth.token.as_deref() {
                request = self.scheme.apply(request, token);
            }

            let response = request
                .send()
                .await
                .map_err(|err| BhError::Network(format!("GET {url}: {err}")))?;
            let status = response.status();
            let content_type = header_value(&response, CONTENT_TYPE);

            // HTML is a hard error no matter the status code: providers hide
            // credential and rate-limit failures behind branded pages.
            if content_type.starts_with("text/html") {
                let body = response.text().await.unwrap_or_default();
                return Err(BhError::ResponseShape {
                    url: url.to_string(),
                    detail: format!("HTML error page: {}", html::page_text(&body)),
                });
            }

            if status.as_u16() >= 400 {
                let is_auth_failure = status.as_u16() == 401 || status.as_u16() == 403;
                if is_auth_failure
                    && retries < MAX_AUTH_ATTEMPTS
                    && self.auth.attempted_count().await < MAX_AUTH_ATTEMPTS
                {
                    tracing::info!(%url, status = status.as_u16(), retries, "auth failure, re-resolving credential");
                    self.auth
                        .invalidate(&format!("HTTP {} from {url}", status.as_u16()))
                        .await;
                    retries += 1;
                    continue;
                }
                return Err(self.status_error(url, status.as_u16(), &auth).await);
            }

            if !is_json(&content_type) && !is_octet(&content_type) {
                return Err(BhError::ResponseShape {
                    url: url.to_string(),
                    detail: format!("unexpected content type: {content_type}"),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|err| BhError::Network(format!("read body of {url}: {err}")))?;
            return serde_json::from_str(&body).map_err(|err| BhError::ResponseShape {
                url: url.to_string(),
                detail: format!("invalid JSON: {err}"),
            });
        }
    }

    /// GET `url` and deserialize the JSON body into `T`.
    pub async fn get_json_as<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let value = self.get_json(url).await?;
        serde_json::from_value(value).map_err(|err| BhError::ResponseShape {
            url: url.to_string(),
            detail: format!("unexpected JSON shape: {err}"),
        })
    }

    async fn status_error(&self, url: &str, status: u16, auth: &ResolvedAuth) -> BhError {
        let tried = self.auth.attempted_providers().await;
        let tried = if tried.is_empty() {
            format!("current: {}", auth.method)
        } else {
            format!("tried: {}; current: {}", tried.join(", "), auth.method)
        };
        match status {
            404 => BhError::NotFound(format!(
                "{url} not found or not accessible, check authentication"
            )),
            401 => BhError::Auth(format!(
                "authentication failed for {url}, token may be invalid or expired ({tried})"
            )),
            403 => BhError::Auth(format!(
                "access forbidden for {url}, token may lack required scope ({tried})"
            )),
            _ => BhError::Http {
                url: url.to_string(),
                status,
            },
        }
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> String {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn is_json(content_type: &str) -> bool {
    content_type.contains("json")
}

fn is_octet(content_type: &str) -> bool {
    content_type.starts_with("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_accept_headers() {
        assert_eq!(AuthScheme::Bearer.accept(), "application/vnd.github+json");
        assert_eq!(AuthScheme::PrivateToken.accept(), "application/json");
    }

    #[test]
    fn content_type_classification() {
        assert!(is_json("application/json; charset=utf-8"));
        assert!(is_json("application/vnd.github+json"));
        assert!(is_octet("application/octet-stream"));
        assert!(!is_json("text/plain"));
        assert!(!is_octet("text/html; charset=utf-8"));
    }
}
