//! Skill directory backend.
//!
//! Each immediate subdirectory holding a parseable `SKILL.md` is one
//! bundle, tagged `skill`. Subdirectories without one are not bundles and
//! are silently skipped; they never fail the listing.

use std::path::{Path, PathBuf};

use crate::archive::repackage_dir;
use crate::error::{BhError, Result};
use crate::manifest::{DeploymentManifest, Provenance};
use crate::model::{Bundle, Source, ValidationResult};
use crate::skill::{parse_skill_md, SkillFrontmatter, SKILL_FILE};
use crate::sources::{dir_size, file_url, local_root, BundleSource};
use crate::util::humanize_bytes;

pub struct SkillDirectorySource {
    source: Source,
    root: PathBuf,
}

impl SkillDirectorySource {
    pub fn new(source: Source) -> Result<Self> {
        let root = local_root(&source.base_url);
        Ok(Self { source, root })
    }

    fn skill_dirs(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(BhError::NotFound(format!(
                "skill directory does not exist: {}",
                self.root.display()
            )));
        }
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn read_frontmatter(dir: &Path) -> Result<SkillFrontmatter> {
        let skill_path = dir.join(SKILL_FILE);
        let content = std::fs::read_to_string(&skill_path)?;
        let (frontmatter, _body) = parse_skill_md(&content)?;
        Ok(frontmatter)
    }

    fn bundle_from_dir(&self, dir: &Path) -> Result<Bundle> {
        let frontmatter = Self::read_frontmatter(dir)?;
        let id = dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("skill")
            .to_string();

        let bundle = Bundle {
            id: id.clone(),
            name: frontmatter.name.clone(),
            version: frontmatter
                .version
                .clone()
                .unwrap_or_else(|| "1.0.0".to_string()),
            description: frontmatter.description.clone(),
            author: String::new(),
            source_id: self.source.id.clone(),
            targets: vec!["all".to_string()],
            tags: vec!["skill".to_string()],
            last_updated: String::new(),
            size: humanize_bytes(dir_size(dir)),
            dependencies: Vec::new(),
            license: frontmatter.license.clone().unwrap_or_default(),
            manifest_url: file_url(&dir.join(SKILL_FILE)),
            download_url: file_url(dir),
            repository_url: None,
            homepage_url: None,
        };
        bundle.validate()?;
        Ok(bundle)
    }
}

#[async_trait::async_trait]
impl BundleSource for SkillDirectorySource {
    fn source(&self) -> &Source {
        &self.source
    }

    async fn list_bundles(&self) -> Result<Vec<Bundle>> {
        let mut bundles = Vec::new();
        for dir in self.skill_dirs()? {
            if !dir.join(SKILL_FILE).is_file() {
                tracing::debug!(dir = %dir.display(), "no SKILL.md, not a skill");
                continue;
            }
            match self.bundle_from_dir(&dir) {
                Ok(bundle) => bundles.push(bundle),
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "skipping unparseable skill");
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
                        "no skill folders with {SKILL_FILE} under {}",
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
        let frontmatter = Self::read_frontmatter(&dir).map_err(|err| {
            BhError::NotFound(format!(
                "skill {} is gone from {}: {err}",
                bundle.id,
                dir.display()
            ))
        })?;
        let manifest = DeploymentManifest::for_skill(
            &bundle.id,
            &frontmatter.name,
            &bundle.version,
            &frontmatter.description,
            frontmatter.license.as_deref(),
            &Provenance {
                repository_kind: "local".to_string(),
                repository_url: String::new(),
                directory: dir.display().to_string(),
            },
        );
        repackage_dir(&dir, Some(&format!("skills/{}", bundle.id)), &manifest)
    }
}
