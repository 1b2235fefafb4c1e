//! Curated collection repository backend.
//!
//! A repository of `*.collection.yml` files, each describing one bundle.
//! Collection files are parsed in bounded batches to overlap I/O latency
//! without tripping provider rate limits; archives are assembled on demand
//! by fetching each referenced item.

use std::sync::Arc;

use serde::Deserialize;

use crate::archive::{assemble_collection, ItemFetcher};
use crate::auth::{AuthResolver, NoSession, ProcessTokenSource};
use crate::cache::DiscoveryCache;
use crate::collection::{CollectionManifest, COLLECTION_SUFFIX};
use crate::error::{BhError, Result};
use crate::fetch::{http_client, AuthScheme, Downloader, Fetcher, TrustDomains};
use crate::manifest::{DeploymentManifest, Provenance};
use crate::model::{Bundle, Source, ValidationResult};
use crate::sources::{parse_repo, BundleSource, RepoRef};
use crate::util::humanize_bytes;

const GH_API: &str = "https://api.github.com";
const GH_RAW: &str = "https://raw.githubusercontent.com";

/// Collection files fetched concurrently per batch.
const PARSE_BATCH_WIDTH: usize = 5;

#[derive(Debug, Clone, Deserialize)]
struct ContentEntry {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    download_url: Option<String>,
}

pub struct CollectionRepoSource {
    source: Source,
    repo: RepoRef,
    branch: String,
    api_base: String,
    raw_base: String,
    fetcher: Fetcher,
    downloader: Arc<Downloader>,
    cache: DiscoveryCache,
}

impl CollectionRepoSource {
    pub fn new(source: Source) -> Result<Self> {
        Self::with_bases(source, "main", GH_API, GH_RAW)
    }

    pub fn with_branch(source: Source, branch: &str) -> Result<Self> {
        Self::with_bases(source, branch, GH_API, GH_RAW)
    }

    /// Fully parameterized constructor for enterprise hosts and tests.
    pub fn with_bases(
        source: Source,
        branch: &str,
        api_base: &str,
        raw_base: &str,
    ) -> Result<Self> {
        let repo = parse_repo(&source.base_url)?;
        let auth = Arc::new(AuthResolver::new(
            source.token.clone(),
            Arc::new(NoSession),
            Arc::new(ProcessTokenSource::github()),
        ));
        let client = http_client()?;
        let api_host = reqwest::Url::parse(api_base)
            .map_err(|err| BhError::Config(format!("invalid API base {api_base}: {err}")))?
            .host_str()
            .unwrap_or_default()
            .to_string();
        let trust = TrustDomains::github(&api_host);
        Ok(Self {
            source,
            repo,
            branch: branch.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            raw_base: raw_base.trim_end_matches('/').to_string(),
            fetcher: Fetcher::new(client.clone(), auth.clone(), AuthScheme::Bearer),
            downloader: Arc::new(Downloader::new(client, auth, AuthScheme::Bearer, trust)),
            cache: DiscoveryCache::default(),
        })
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/contents?ref={}",
            self.api_base, self.repo.owner, self.repo.repo, self.branch
        )
    }

    fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{path}",
            self.raw_base, self.repo.owner, self.repo.repo, self.branch
        )
    }

    async fn discover(&self) -> Result<Vec<Bundle>> {
        let entries: Vec<ContentEntry> = self.fetcher.get_json_as(&self.contents_url()).await?;
        let collection_files: Vec<ContentEntry> = entries
            .into_iter()
            .filter(|entry| entry.kind == "file" && entry.name.ends_with(COLLECTION_SUFFIX))
            .collect();
        tracing::debug!(
            repo = %self.repo,
            files = collection_files.len(),
            "found collection manifests"
        );

        // Batches of fixed width: overlap the I/O, keep the rate limiter
        // happy, and keep output order equal to listing order.
        let mut bundles = Vec::new();
        for batch in collection_files.chunks(PARSE_BATCH_WIDTH) {
            let parsed = futures::future::join_all(
                batch.iter().map(|entry| self.bundle_from_entry(entry)),
            )
            .await;
            for (entry, outcome) in batch.iter().zip(parsed) {
                match outcome {
                    Ok(bundle) => bundles.push(bundle),
                    Err(err) => {
                        tracing::warn!(path = %entry.path, error = %err, "skipping collection file");
                    }
                }
            }
        }
        Ok(bundles)
    }

    async fn bundle_from_entry(&self, entry: &ContentEntry) -> Result<Bundle> {
        let url = entry
            .download_url
            .clone()
            .unwrap_or_else(|| self.raw_url(&entry.path));
        let bytes = self.downloader.download(&url).await?;
        let text = String::from_utf8_lossy(&bytes);
        let collection = CollectionManifest::from_yaml_str(&text)?;

        let bundle = Bundle {
            id: collection.id.clone(),
            name: collection.name.clone(),
            version: collection.version_or_default(),
            description: collection.description.clone(),
            author: collection.author.clone().unwrap_or_default(),
            source_id: self.source.id.clone(),
            targets: vec!["all".to_string()],
            tags: collection.tags.clone(),
            last_updated: String::new(),
            size: humanize_bytes(entry.size),
            dependencies: Vec::new(),
            license: String::new(),
            manifest_url: url.clone(),
            download_url: url,
            repository_url: Some(format!("https://github.com/{}", self.repo)),
            homepage_url: None,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            repository_kind: "git".to_string(),
            repository_url: format!("https://github.com/{}", self.repo),
            directory: String::new(),
        }
    }
}

/// Fetches collection items from the repository's raw-content host.
struct RawItemFetcher {
    downloader: Arc<Downloader>,
    raw_base: String,
    repo: RepoRef,
    branch: String,
}

#[async_trait::async_trait]
impl ItemFetcher for RawItemFetcher {
    async fn fetch_item(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/{}/{}/{}/{path}",
            self.raw_base, self.repo.owner, self.repo.repo, self.branch
        );
        self.downloader.download(&url).await
    }
}

#[async_trait::async_trait]
impl BundleSource for CollectionRepoSource {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn list_bundles(&self) -> Result<Vec<Bundle>> {
        let key = format!("{}@{}", self.source.id, self.branch);
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
                        "{} has no parseable {COLLECTION_SUFFIX} files on {}",
                        self.repo, self.branch
                    ))
                } else {
                    result
                }
            }
            Err(err) => {
                ValidationResult::failed(format!("listing {} failed: {err}", self.repo))
            }
        }
    }

    async fn download_bundle(&self, bundle: &Bundle) -> Result<Vec<u8>> {
        let bytes = self.downloader.download(&bundle.manifest_url).await?;
        let text = String::from_utf8_lossy(&bytes);
        let collection = CollectionManifest::from_yaml_str(&text)?;
        let manifest = DeploymentManifest::from_collection(&collection, &self.provenance());
        let fetcher = RawItemFetcher {
            downloader: self.downloader.clone(),
            raw_base: self.raw_base.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
        };
        assemble_collection(&collection, &manifest, &fetcher).await
    }
}
