//! Normalized value objects shared by every backend adapter.

use serde::{Deserialize, Serialize};

use crate::error::{BhError, Result};

/// One configured origin that bundles are discovered from.
///
/// Immutable once an adapter has been constructed from it; adapters take a
/// `Source` by value and never share it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier, unique among configured sources
    pub id: String,
    /// Display name
    pub name: String,
    /// Backend kind tag
    pub kind: SourceKind,
    /// Base URL (API root for remote kinds, directory path or `file://` URL
    /// for local kinds)
    pub base_url: String,
    /// Explicitly configured credential, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Disabled sources are skipped by callers
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ordering among sources; lower runs first
    #[serde(default)]
    pub priority: u32,
}

fn default_enabled() -> bool {
    true
}

/// Backend kind for a [`Source`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// GitHub releases API
    #[serde(rename = "github")]
    GitHub,
    /// GitLab releases API
    #[serde(rename = "gitlab")]
    GitLab,
    /// Local directory of packaged bundles
    LocalDirectory,
    /// Repository of curated `*.collection.yml` manifests
    Collection,
    /// Local directory of `SKILL.md` skill folders
    SkillDirectory,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::GitHub => "github",
            SourceKind::GitLab => "gitlab",
            SourceKind::LocalDirectory => "local-directory",
            SourceKind::Collection => "collection",
            SourceKind::SkillDirectory => "skill-directory",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Source {
    pub fn new(id: impl Into<String>, kind: SourceKind, base_url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            base_url: base_url.into(),
            token: None,
            enabled: true,
            priority: 0,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Normalized descriptor of one installable bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    /// Unique within the owning source
    pub id: String,
    pub name: String,
    /// Semantic version string
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Id of the owning [`Source`]
    pub source_id: String,
    /// Target environments this bundle applies to
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// RFC 3339 timestamp of the last update, when known
    #[serde(default)]
    pub last_updated: String,
    /// Human-readable size ("4.2 KB")
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub dependencies: Vec<BundleDependency>,
    #[serde(default)]
    pub license: String,
    /// Where the deployment manifest can be fetched from
    pub manifest_url: String,
    /// Where the archive (or archive input) can be fetched from
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage_url: Option<String>,
}

/// Declared dependency of a bundle on another bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleDependency {
    /// Target bundle id
    pub id: String,
    /// Version-range string (semver range syntax)
    pub version_range: String,
    #[serde(default)]
    pub optional: bool,
}

impl BundleDependency {
    /// True when `version` satisfies this dependency's range.
    ///
    /// An unparseable range or version never matches; dependency resolution
    /// is out of scope here, so this is strictly a predicate.
    pub fn is_satisfied_by(&self, version: &str) -> bool {
        let Ok(req) = semver::VersionReq::parse(&self.version_range) else {
            return false;
        };
        let Ok(version) = semver::Version::parse(version) else {
            return false;
        };
        req.matches(&version)
    }
}

impl Bundle {
    /// Check the discovery invariant: identity and URL fields are non-empty.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("source_id", &self.source_id),
            ("manifest_url", &self.manifest_url),
            ("download_url", &self.download_url),
        ] {
            if value.trim().is_empty() {
                return Err(BhError::ValidationFailed(format!(
                    "bundle {field} must be non-empty"
                )));
            }
        }
        Ok(())
    }
}

/// Uniform result of a backend health check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_count: Option<usize>,
}

impl ValidationResult {
    pub fn ok(bundle_count: usize) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            bundle_count: Some(bundle_count),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
            bundle_count: None,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}
