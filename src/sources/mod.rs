//! Backend adapters.
//!
//! Every backend implements the same capability interface; cross-variant
//! helpers live here as free functions rather than inherited state.

pub mod collection;
pub mod github;
pub mod gitlab;
pub mod local;
pub mod skills;

use std::path::Path;

use async_trait::async_trait;

use crate::error::{BhError, Result};
use crate::model::{Bundle, Source, SourceKind, ValidationResult};

pub use collection::CollectionRepoSource;
pub use github::GitHubSource;
pub use gitlab::GitLabSource;
pub use local::LocalDirectorySource;
pub use skills::SkillDirectorySource;

/// Common contract of every backend.
#[async_trait]
pub trait BundleSource: Send + Sync {
    /// The source this adapter was constructed from.
    fn source(&self) -> &Source;

    /// Discover all bundles this source currently offers.
    async fn list_bundles(&self) -> Result<Vec<Bundle>>;

    /// Look up a single bundle by id.
    async fn get_bundle(&self, id: &str) -> Result<Option<Bundle>> {
        let bundles = self.list_bundles().await?;
        Ok(bundles.into_iter().find(|bundle| bundle.id == id))
    }

    /// Health check; structural problems land in the result, not an error.
    async fn validate(&self) -> ValidationResult;

    fn manifest_url(&self, bundle: &Bundle) -> String {
        bundle.manifest_url.clone()
    }

    fn download_url(&self, bundle: &Bundle) -> String {
        bundle.download_url.clone()
    }

    /// Produce the bundle's ZIP archive bytes.
    async fn download_bundle(&self, bundle: &Bundle) -> Result<Vec<u8>>;
}

/// Construct the adapter matching the source's backend kind.
pub fn create_source(source: Source) -> Result<Box<dyn BundleSource>> {
    match source.kind {
        SourceKind::GitHub => Ok(Box::new(GitHubSource::new(source)?)),
        SourceKind::GitLab => Ok(Box::new(GitLabSource::new(source)?)),
        SourceKind::Collection => Ok(Box::new(CollectionRepoSource::new(source)?)),
        SourceKind::LocalDirectory => Ok(Box::new(LocalDirectorySource::new(source)?)),
        SourceKind::SkillDirectory => Ok(Box::new(SkillDirectorySource::new(source)?)),
    }
}

/// `owner/repo` reference, with common URL prefixes tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

pub fn parse_repo(input: &str) -> Result<RepoRef> {
    for prefix in [
        "https://github.com/",
        "http://github.com/",
        "github.com/",
        "https://gitlab.com/",
        "gitlab.com/",
    ] {
        if let Some(stripped) = input.strip_prefix(prefix) {
            return parse_repo(stripped);
        }
    }
    let mut parts = input.split('/');
    let owner = parts.next().unwrap_or("").trim();
    let repo = parts.next().unwrap_or("").trim();
    if owner.is_empty() || repo.is_empty() {
        return Err(BhError::Config(format!("invalid repo reference: {input}")));
    }
    for part in parts {
        if !part.trim().is_empty() {
            return Err(BhError::Config(format!("invalid repo reference: {input}")));
        }
    }
    Ok(RepoRef {
        owner: owner.to_string(),
        repo: repo.trim_end_matches(".git").to_string(),
    })
}

/// Total size of all files under `root`.
pub(crate) fn dir_size(root: &Path) -> u64 {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// Resolve a local path out of a `file://` URL or a plain path string.
pub(crate) fn local_root(base_url: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(base_url.strip_prefix("file://").unwrap_or(base_url))
}

/// `file://` URL for a local path.
pub(crate) fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Version string with a leading `v` tag prefix removed.
pub(crate) fn version_from_tag(tag: &str) -> String {
    tag.strip_prefix('v').unwrap_or(tag).to_string()
}

/// True when an asset name looks like a bundle archive.
pub(crate) fn is_archive_asset(name: &str) -> bool {
    name.ends_with(".zip") || name.ends_with(".tar.gz")
}
