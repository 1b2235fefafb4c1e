//! GitLab releases backend.
//!
//! Same pairing rules as the GitHub backend over the GitLab release and
//! asset-link API shape; the credential travels in a `PRIVATE-TOKEN`
//! header instead of a bearer header.

use std::sync::Arc;

use serde::Deserialize;

use crate::auth::{AuthResolver, NoSession, ProcessTokenSource};
use crate::cache::DiscoveryCache;
use crate::error::{BhError, Result};
use crate::fetch::{http_client, AuthScheme, Downloader, Fetcher, TrustDomains};
use crate::manifest::{DeploymentManifest, DEPLOYMENT_MANIFEST};
use crate::model::{Bundle, Source, ValidationResult};
use crate::sources::{is_archive_asset, parse_repo, version_from_tag, BundleSource, RepoRef};

const GL_HOST: &str = "https://gitlab.com";

#[derive(Debug, Clone, Deserialize)]
struct GlRelease {
    tag_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    released_at: Option<String>,
    #[serde(default)]
    assets: GlAssets,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GlAssets {
    #[serde(default)]
    links: Vec<GlLink>,
}

#[derive(Debug, Clone, Deserialize)]
struct GlLink {
    name: String,
    url: String,
    #[serde(default)]
    direct_asset_url: Option<String>,
}

impl GlLink {
    fn best_url(&self) -> &str {
        self.direct_asset_url.as_deref().unwrap_or(&self.url)
    }
}

pub struct GitLabSource {
    source: Source,
    repo: RepoRef,
    host: String,
    fetcher: Fetcher,
    downloader: Downloader,
    cache: DiscoveryCache,
}

impl GitLabSource {
    pub fn new(source: Source) -> Result<Self> {
        Self::with_host(source, GL_HOST)
    }

    /// Adapter against a self-hosted GitLab (or a test server).
    pub fn with_host(source: Source, host: &str) -> Result<Self> {
        let repo = parse_repo(&source.base_url)?;
        let auth = Arc::new(AuthResolver::new(
            source.token.clone(),
            Arc::new(NoSession),
            Arc::new(ProcessTokenSource::gitlab()),
        ));
        let client = http_client()?;
        let host_name = host_name_of(host)?;
        let trust = TrustDomains::gitlab(&host_name);
        Ok(Self {
            source,
            repo,
            host: host.trim_end_matches('/').to_string(),
            fetcher: Fetcher::new(client.clone(), auth.clone(), AuthScheme::PrivateToken),
            downloader: Downloader::new(client, auth, AuthScheme::PrivateToken, trust),
            cache: DiscoveryCache::default(),
        })
    }

    fn releases_url(&self) -> String {
        let project = urlencoding::encode(&format!("{}/{}", self.repo.owner, self.repo.repo))
            .into_owned();
        format!("{}/api/v4/projects/{project}/releases", self.host)
    }

    async fn discover(&self) -> Result<Vec<Bundle>> {
        let url = self.releases_url();
        let releases: Vec<GlRelease> = self.fetcher.get_json_as(&url).await?;
        tracing::debug!(project = %self.repo, count = releases.len(), "listing releases");

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

    async fn bundle_from_release(&self, release: &GlRelease) -> Result<Option<Bundle>> {
        let manifest_link = release
            .assets
            .links
            .iter()
            .find(|link| link.name == DEPLOYMENT_MANIFEST);
        let archive_link = release
            .assets
            .links
            .iter()
            .find(|link| is_archive_asset(&link.name));
        let (Some(manifest_link), Some(archive_link)) = (manifest_link, archive_link) else {
            return Ok(None);
        };

        let manifest_bytes = self.downloader.download(manifest_link.best_url()).await?;
        let manifest_text = String::from_utf8_lossy(&manifest_bytes);
        let manifest = DeploymentManifest::from_yaml_str(&manifest_text)?;

        let version = version_from_tag(&release.tag_name);
        let bundle = Bundle {
            id: format!("{}-{}", manifest.id, version),
            name: manifest.name.clone(),
            version,
            description: if manifest.metadata.description.is_empty() {
                release.description.clone()
            } else {
                manifest.metadata.description.clone()
            },
            author: manifest.metadata.author.clone(),
            source_id: self.source.id.clone(),
            targets: vec!["all".to_string()],
            tags: manifest.metadata.keywords.clone(),
            last_updated: release.released_at.clone().unwrap_or_default(),
            size: String::new(),
            dependencies: Vec::new(),
            license: manifest.metadata.license.clone(),
            manifest_url: manifest_link.best_url().to_string(),
            download_url: archive_link.best_url().to_string(),
            repository_url: Some(format!("{}/{}", self.host, self.repo)),
            homepage_url: None,
        };
        bundle.validate()?;
        Ok(Some(bundle))
    }
}

#[async_trait::async_trait]
impl BundleSource for GitLabSource {
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
            Ok(bundles) => ValidationResult::ok(bundles.len()),
            Err(err) => ValidationResult::failed(format!(
                "listing releases of {} failed: {err}",
                self.repo
            )),
        }
    }

    async fn download_bundle(&self, bundle: &Bundle) -> Result<Vec<u8>> {
        self.downloader.download(&bundle.download_url).await
    }
}

fn host_name_of(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|err| BhError::Config(format!("invalid host {url}: {err}")))?;
    Ok(parsed.host_str().unwrap_or_default().to_string())
}
