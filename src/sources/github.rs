//! GitHub releases backend.
//!
//! A release becomes exactly one bundle when it carries both a
//! `deployment-manifest.yml` asset and a `.zip`/`.tar.gz` archive asset;
//! releases missing either are not bundles.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::{AuthResolver, NoSession, ProcessTokenSource};
use crate::cache::DiscoveryCache;
use crate::error::{BhError, Result};
use crate::fetch::{http_client, AuthScheme, Downloader, Fetcher, TrustDomains};
use crate::manifest::{DeploymentManifest, DEPLOYMENT_MANIFEST};
use crate::model::{Bundle, Source, ValidationResult};
use crate::sources::{is_archive_asset, parse_repo, version_from_tag, BundleSource, RepoRef};
use crate::util::humanize_bytes;

const GH_API: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReleaseAsset {
    name: String,
    #[serde(default)]
    size: u64,
    /// API endpoint for the asset; returns bytes under an octet Accept
    url: String,
}

pub struct GitHubSource {
    source: Source,
    repo: RepoRef,
    api_base: String,
    fetcher: Fetcher,
    downloader: Downloader,
    cache: DiscoveryCache,
}

impl GitHubSource {
    pub fn new(source: Source) -> Result<Self> {
        Self::with_api_base(source, GH_API)
    }

    /// Adapter against a non-default API root (enterprise hosts, tests).
    pub fn with_api_base(source: Source, api_base: &str) -> Result<Self> {
        let repo = parse_repo(&source.base_url)?;
        let auth = Arc::new(AuthResolver::new(
            source.token.clone(),
            Arc::new(NoSession),
            Arc::new(ProcessTokenSource::github()),
        ));
        let client = http_client()?;
        let api_host = host_of(api_base)?;
        let trust = TrustDomains::github(&api_host);
        Ok(Self {
            source,
            repo,
            api_base: api_base.trim_end_matches('/').to_string(),
            fetcher: Fetcher::new(client.clone(), auth.clone(), AuthScheme::Bearer),
            downloader: Downloader::new(client, auth, AuthScheme::Bearer, trust),
            cache: DiscoveryCache::default(),
        })
    }

    fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases",
            self.api_base, self.repo.owner, self.repo.repo
        )
    }

    async fn discover(&self) -> Result<Vec<Bundle>> {
        let url = self.releases_url();
        let releases: Vec<Release> = self.fetcher.get_json_as(&url).await?;
        tracing::debug!(repo = %self.repo, count = releases.len(), "listing releases");

        let mut bundles = Vec::new();
        for release in releases {
            match self.bundle_from_release(&release).await {
                Ok(Some(bundle)) => bundles.push(bundle),
                Ok(None) => {
                    tracing::debug!(tag = %release.tag_name, "release has no bundle assets");
                }
                Err(err) => {
                    tracing::warn!(tag = %release.tag_name, error = %err, "skipping release");
                }
            }
        }
        Ok(bundles)
    }

    /// Map one release to at most one bundle.
    async fn bundle_from_release(&self, release: &Release) -> Result<Option<Bundle>> {
        let manifest_asset = release
            .assets
            .iter()
            .find(|asset| asset.name == DEPLOYMENT_MANIFEST);
        let archive_asset = release.assets.iter().find(|asset| is_archive_asset(&asset.name));
        let (Some(manifest_asset), Some(archive_asset)) = (manifest_asset, archive_asset) else {
            return Ok(None);
        };

        let manifest_bytes = self.downloader.download(&manifest_asset.url).await?;
        let manifest_text = String::from_utf8_lossy(&manifest_bytes);
        let manifest = DeploymentManifest::from_yaml_str(&manifest_text)?;

        let version = version_from_tag(&release.tag_name);
        let bundle = Bundle {
            id: format!("{}-{}", manifest.id, version),
            name: manifest.name.clone(),
            version,
            description: manifest.metadata.description.clone(),
            author: manifest.metadata.author.clone(),
            source_id: self.source.id.clone(),
            targets: vec!["all".to_string()],
            tags: manifest.metadata.keywords.clone(),
            last_updated: release.published_at.clone().unwrap_or_default(),
            size: humanize_bytes(archive_asset.size),
            dependencies: Vec::new(),
            license: manifest.metadata.license.clone(),
            manifest_url: manifest_asset.url.clone(),
            download_url: archive_asset.url.clone(),
            repository_url: Some(if manifest.metadata.repository.url.is_empty() {
                release.html_url.clone()
            } else {
                manifest.metadata.repository.url.clone()
            }),
            homepage_url: None,
        };
        bundle.validate()?;
        Ok(Some(bundle))
    }
}

#[async_trait::async_trait]
impl BundleSource for GitHubSource {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn list_bundles(&self) -> Result<Vec<Bundle>> {
        let key = format!("{}@releases", self.source.id);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }
        let bundles = self.discover().await?;
        self.cache.put(&key, bundles.clone()).await;
        Ok(bundles)
    }

    async fn validate(&self) -> ValidationResult {
        match self.list_bundles().await {
            Ok(bundles) => {
                let result = ValidationResult::ok(bundles.len());
                if bundles.is_empty() {
                    result.with_warning(format!(
                        "no releases of {} carry both a manifest and an archive asset",
                        self.repo
                    ))
                } else {
                    result
                }
            }
            Err(err) => ValidationResult::failed(format!(
                "listing releases of {} failed: {err}",
                self.repo
            )),
        }
    }

    async fn download_bundle(&self, bundle: &Bundle) -> Result<Vec<u8>> {
        let bytes = self.downloader.download(&bundle.download_url).await?;
        if bytes.is_empty() {
            return Err(BhError::Archive(format!(
                "asset for bundle {} was empty",
                bundle.id
            )));
        }
        Ok(bytes)
    }
}

fn host_of(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|err| BhError::Config(format!("invalid API base {url}: {err}")))?;
    Ok(parsed.host_str().unwrap_or_default().to_string())
}
