//! Binary payload retrieval with explicit redirect handling.
//!
//! Downloads differ from API fetches in two ways: redirects are followed
//! manually up to a fixed depth, and the credential is attached only to
//! hosts inside the provider's trust domain so a redirect to a third-party
//! CDN never sees the token. Auth failures are surfaced to the caller
//! directly; there is no invalidate-and-retry dance on this path.

use std::sync::Arc;

use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::StatusCode;

use crate::auth::AuthResolver;
use crate::error::{BhError, Result};
use crate::fetch::{AuthScheme, BH_USER_AGENT};

/// Redirect chains longer than this are treated as pathological.
pub const MAX_REDIRECTS: u32 = 10;

/// Bundles larger than this are rejected rather than buffered.
const MAX_DOWNLOAD_SIZE: u64 = 100 * 1024 * 1024;

/// Hosts a credential may be sent to.
#[derive(Debug, Clone)]
pub struct TrustDomains {
    /// API host; requests to it ask for binary content explicitly
    api_host: String,
    /// Base domains of the provider and its content delivery hosts
    domains: Vec<String>,
}

impl TrustDomains {
    pub fn new(api_host: impl Into<String>, domains: &[&str]) -> Self {
        Self {
            api_host: api_host.into().to_ascii_lowercase(),
            domains: domains
                .iter()
                .map(|domain| domain.to_ascii_lowercase())
                .collect(),
        }
    }

    /// GitHub: the API plus the main and content-delivery domains.
    pub fn github(api_host: &str) -> Self {
        Self::new(api_host, &["github.com", "githubusercontent.com"])
    }

    /// GitLab: a single host serves both the API and raw content.
    pub fn gitlab(host: &str) -> Self {
        Self::new(host, &[host])
    }

    pub fn trusts(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if host == self.api_host {
            return true;
        }
        self.domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }

    pub fn is_api_host(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.api_host)
    }
}

/// Retrieves archive and asset bytes.
pub struct Downloader {
    client: reqwest::Client,
    auth: Arc<AuthResolver>,
    scheme: AuthScheme,
    trust: TrustDomains,
}

impl Downloader {
    pub fn new(
        client: reqwest::Client,
        auth: Arc<AuthResolver>,
        scheme: AuthScheme,
        trust: TrustDomains,
    ) -> Self {
        Self {
            client,
            auth,
            scheme,
            trust,
        }
    }

    /// Fetch `url`, following up to [`MAX_REDIRECTS`] redirects, and buffer
    /// the full body.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let mut current = url.to_string();
        let mut depth = 0u32;

        loop {
            let auth = self.auth.resolve().await;
            let parsed = reqwest::Url::parse(&current).map_err(|err| {
                BhError::Config(format!("invalid download URL {current}: {err}"))
            })?;
            let host = parsed.host_str().unwrap_or_default().to_string();

            let mut request = self.client.get(parsed).header(USER_AGENT, BH_USER_AGENT);
            if self.trust.trusts(&host) {
                if let Some(token) = auth.token.as_deref() {
                    request = self.scheme.apply(request, token);
                }
            }
            // The same API endpoint returns JSON metadata unless binary
            // content is requested explicitly.
            if self.trust.is_api_host(&host) {
                request = request.header(ACCEPT, "application/octet-stream");
            }

            let response = request
                .send()
                .await
                .map_err(|err| BhError::Network(format!("GET {current}: {err}")))?;
            let status = response.status();

            if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| BhError::ResponseShape {
                        url: current.clone(),
                        detail: "redirect without Location header".to_string(),
                    })?;
                let next = absolutize(&current, location)?;
                depth += 1;
                if depth > MAX_REDIRECTS {
                    tracing::warn!(url, depth, "redirect chain exceeded limit");
                    return Err(BhError::RedirectDepthExceeded {
                        url: next,
                        limit: MAX_REDIRECTS,
                    });
                }
                tracing::debug!(from = %current, to = %next, depth, "following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(BhError::Download {
                    url: current,
                    status: status.as_u16(),
                    method: auth.method.to_string(),
                });
            }

            if let Some(length) = response.content_length() {
                if length > MAX_DOWNLOAD_SIZE {
                    return Err(BhError::Download {
                        url: current,
                        status: status.as_u16(),
                        method: format!(
                            "payload too large: {length} bytes (max {} MB)",
                            MAX_DOWNLOAD_SIZE / (1024 * 1024)
                        ),
                    });
                }
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|err| BhError::Network(format!("read body of {current}: {err}")))?;
            if bytes.len() as u64 > MAX_DOWNLOAD_SIZE {
                return Err(BhError::Archive(format!(
                    "download of {current} exceeded size limit ({} MB)",
                    MAX_DOWNLOAD_SIZE / (1024 * 1024)
                )));
            }
            return Ok(bytes.to_vec());
        }
    }
}

fn absolutize(base: &str, location: &str) -> Result<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Ok(location.to_string());
    }
    let base = reqwest::Url::parse(base)
        .map_err(|err| BhError::Config(format!("invalid URL {base}: {err}")))?;
    let joined = base
        .join(location)
        .map_err(|err| BhError::ResponseShape {
            url: base.to_string(),
            detail: format!("unresolvable redirect target {location}: {err}"),
        })?;
    Ok(joined.to_string())
}
