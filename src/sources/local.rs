//! Local directory backend.
//!
//! Bundles are directories carrying a `deployment-manifest.yml`; URLs use
//! the `file://` scheme and no network request or credential is ever
//! involved. Downloads repackage the directory verbatim.

use std::path::{Path, PathBuf};

use crate::archive::repackage_dir;
use crate::error::{BhError, Result};
use crate::manifest::{DeploymentManifest, DEPLOYMENT_MANIFEST};
use crate::model::{Bundle, Source, ValidationResult};
use crate::sources::{dir_size, file_url, local_root, BundleSource};
use crate::util::humanize_bytes;

pub struct LocalDirectorySource {
    source: Source,
    root: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(source: Source) -> Result<Self> {
        let root = local_root(&source.base_url);
        Ok(Self { source, root })
    }

    /// Directories that may hold a bundle: the root itself plus its
    /// immediate subdirectories.
    fn candidate_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(BhError::NotFound(format!(
                "source directory does not exist: {}",
                self.root.display()
            )));
        }
        let mut dirs = vec![self.root.clone()];
        let mut children: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        children.sort();
        dirs.extend(children);
        Ok(dirs)
    }

    fn bundle_from_dir(&self, dir: &Path) -> Result<Option<Bundle>> {
        let manifest_path = dir.join(DEPLOYMENT_MANIFEST);
        if !manifest_path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&manifest_path)?;
        let manifest = DeploymentManifest::from_yaml_str(&text)?;

        let bundle = Bundle {
            id: manifest.id.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            description: manifest.metadata.description.clone(),
            author: manifest.metadata.author.clone(),
            source_id: self.source.id.clone(),
            targets: vec!["all".to_string()],
            tags: manifest.metadata.keywords.clone(),
            last_updated: manifest.metadata.last_updated.clone(),
            size: humanize_bytes(dir_size(dir)),
            dependencies: Vec::new(),
            license: manifest.metadata.license.clone(),
            manifest_url: file_url(&manifest_path),
            download_url: file_url(dir),
            repository_url: None,
            homepage_url: None,
        };
        bundle.validate()?;
        Ok(Some(bundle))
    }
}

#[async_trait::async_trait]
impl BundleSource for LocalDirectorySource {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn list_bundles(&self) -> Result<Vec<Bundle>> {
        let mut bundles = Vec::new();
        for dir in self.candidate_dirs()? {
            match self.bundle_from_dir(&dir) {
                Ok(Some(bundle)) => bundles.push(bundle),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "skipping bundle directory");
                }
            }
        }
        Ok(bundles)
    }

    async fn validate(&self) -> ValidationResult {
        match self.list_bundles().await {
            Ok(bundles) => {
                let result = ValidationResult::ok(bundles.len());
                if bundles.is_empty() {
                    result.with_warning(format!(
                        "no {DEPLOYMENT_MANIFEST} found under {}",
                        self.root.display()
                    ))
                } else {
                    result
                }
            }
            Err(err) => ValidationResult::failed(err.to_string()),
        }
    }

    async fn download_bundle(&self, bundle: &Bundle) -> Result<Vec<u8>> {
        let dir = local_root(&bundle.download_url);
        let manifest_path = dir.join(DEPLOYMENT_MANIFEST);
        let text = std::fs::read_to_string(&manifest_path).map_err(|err| {
            BhError::NotFound(format!(
                "manifest for bundle {} is gone from {}: {err}",
                bundle.id,
                manifest_path.display()
            ))
        })?;
        let manifest = DeploymentManifest::from_yaml_str(&text)?;
        repackage_dir(&dir, None, &manifest)
    }
}
