//! ZIP archive synthesis.
//!
//! Every produced archive starts with the deployment manifest, followed by
//! item files at predictable relative paths. An archive is complete or not
//! produced at all: a missing source item or writer failure aborts the
//! whole build.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::collection::CollectionManifest;
use crate::error::{BhError, Result};
use crate::manifest::{DeploymentManifest, DEPLOYMENT_MANIFEST};

/// Fetches one referenced item's raw content during assemble mode.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    async fn fetch_item(&self, path: &str) -> Result<Vec<u8>>;
}

/// Streaming archive writer; the manifest is always the first entry.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl ArchiveWriter {
    /// Open a new archive and write `deployment-manifest.yml` as its first
    /// entry.
    pub fn with_manifest(manifest: &DeploymentManifest) -> Result<Self> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options,
        };
        let yaml = manifest.to_yaml_string()?;
        writer.add_file(DEPLOYMENT_MANIFEST, yaml.as_bytes())?;
        Ok(writer)
    }

    pub fn add_file(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        self.zip
            .start_file(path, self.options)
            .map_err(|err| BhError::Archive(format!("start entry {path}: {err}")))?;
        self.zip
            .write_all(bytes)
            .map_err(|err| BhError::Archive(format!("write entry {path}: {err}")))?;
        Ok(())
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        let cursor = self
            .zip
            .finish()
            .map_err(|err| BhError::Archive(format!("finalize archive: {err}")))?;
        Ok(cursor.into_inner())
    }
}

/// Repackage a local directory: every file verbatim at its relative path,
/// under an optional prefix, preceded by the synthesized manifest.
///
/// A `deployment-manifest.yml` already present in the tree is skipped so the
/// archive carries exactly one manifest entry.
pub fn repackage_dir(
    root: &Path,
    prefix: Option<&str>,
    manifest: &DeploymentManifest,
) -> Result<Vec<u8>> {
    if !root.is_dir() {
        return Err(BhError::NotFound(format!(
            "bundle directory does not exist: {}",
            root.display()
        )));
    }

    let mut writer = ArchiveWriter::with_manifest(manifest)?;
    let mut entries: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    entries.sort();

    for path in entries {
        let relative = path
            .strip_prefix(root)
            .map_err(|err| BhError::Archive(format!("relativize {}: {err}", path.display())))?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        if relative == DEPLOYMENT_MANIFEST {
            continue;
        }
        let entry_name = match prefix {
            Some(prefix) => format!("{prefix}/{relative}"),
            None => relative,
        };
        let bytes = std::fs::read(&path)?;
        writer.add_file(&entry_name, &bytes)?;
        tracing::trace!(entry = %entry_name, "added file to archive");
    }

    writer.finish()
}

/// Assemble an archive for a curated collection.
///
/// Items are fetched one at a time and appended under `prompts/<filename>`.
/// A missing item is a hard failure for the whole bundle, never a skip.
pub async fn assemble_collection(
    collection: &CollectionManifest,
    manifest: &DeploymentManifest,
    fetcher: &dyn ItemFetcher,
) -> Result<Vec<u8>> {
    let mut writer = ArchiveWriter::with_manifest(manifest)?;

    for item in &collection.items {
        let bytes = fetcher.fetch_item(&item.path).await.map_err(|err| {
            BhError::Archive(format!(
                "collection {} is missing item {}: {err}",
                collection.id, item.path
            ))
        })?;
        let entry_name = format!("prompts/{}", item.file_name());
        writer.add_file(&entry_name, &bytes)?;
        tracing::debug!(item = %item.path, entry = %entry_name, "appended collection item");
    }

    writer.finish()
}

/// Count entries with the given name; used by health checks and tests.
pub fn count_entries(bytes: &[u8], name: &str) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| BhError::Archive(format!("open archive: {err}")))?;
    let mut count = 0;
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|err| BhError::Archive(format!("read archive entry {index}: {err}")))?;
        if entry.name() == name {
            count += 1;
        }
    }
    Ok(count)
}

/// Read one entry's bytes back out of an archive.
pub fn read_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| BhError::Archive(format!("open archive: {err}")))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|err| BhError::Archive(format!("entry {name}: {err}")))?;
    let mut content = Vec::new();
    entry
        .read_to_end(&mut content)
        .map_err(|err| BhError::Archive(format!("read entry {name}: {err}")))?;
    Ok(content)
}
