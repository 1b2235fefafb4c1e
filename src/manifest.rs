//! The canonical deployment manifest embedded in every produced archive.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::collection::{CollectionItem, CollectionManifest};
use crate::error::{BhError, Result};

/// Archive entry name of the manifest; always the first entry written.
pub const DEPLOYMENT_MANIFEST: &str = "deployment-manifest.yml";

/// Schema version written into new manifests.
pub const MANIFEST_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentManifest {
    pub id: String,
    pub version: String,
    pub name: String,
    pub metadata: ManifestMetadata,
    #[serde(default)]
    pub common: CommonSection,
    pub bundle_settings: BundleSettings,
    #[serde(default)]
    pub prompts: Vec<PromptEntry>,
    #[serde(
        default,
        rename = "mcpServers",
        skip_serializing_if = "Option::is_none"
    )]
    pub mcp_servers: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestMetadata {
    pub manifest_version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub last_updated: String,
    pub repository: RepositoryInfo,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryInfo {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub directory: String,
}

/// Recognized layout of the bundle; defaults to "include everything".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommonSection {
    #[serde(default)]
    pub directories: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for CommonSection {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            files: Vec::new(),
            include_patterns: vec!["**/*".to_string()],
            exclude_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleSettings {
    pub include_common_in_environment_bundles: bool,
    pub create_common_bundle: bool,
    pub compression: String,
    pub naming: NamingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamingSettings {
    pub common_bundle: String,
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            include_common_in_environment_bundles: true,
            create_common_bundle: true,
            compression: "zip".to_string(),
            naming: NamingSettings {
                common_bundle: "{id}-{version}".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Path of the item inside the archive
    pub file: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Provenance recorded in a synthesized manifest.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    pub repository_kind: String,
    pub repository_url: String,
    pub directory: String,
}

impl DeploymentManifest {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(input).map_err(|err| {
            BhError::ValidationFailed(format!("deployment manifest parse error: {err}"))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(BhError::Yaml)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("id", &self.id),
            ("version", &self.version),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(BhError::ValidationFailed(format!(
                    "deployment manifest {field} must be non-empty"
                )));
            }
        }
        for prompt in &self.prompts {
            if prompt.file.trim().is_empty() {
                return Err(BhError::ValidationFailed(format!(
                    "prompt {} has no file path",
                    prompt.id
                )));
            }
        }
        Ok(())
    }

    /// Synthesize the manifest for a curated collection.
    ///
    /// Items land under `prompts/<filename>` in the archive; the entry list
    /// mirrors that layout. Embedded sub-service definitions are passed
    /// through verbatim.
    pub fn from_collection(collection: &CollectionManifest, provenance: &Provenance) -> Self {
        let prompts = collection
            .items
            .iter()
            .map(|item| PromptEntry {
                id: item.item_id(),
                name: item.display_name(),
                description: collection.description.clone(),
                file: format!("prompts/{}", item.file_name()),
                kind: item.kind.manifest_type().to_string(),
                tags: collection.tags.clone(),
            })
            .collect();

        Self {
            id: collection.id.clone(),
            version: collection.version_or_default(),
            name: collection.name.clone(),
            metadata: ManifestMetadata {
                manifest_version: MANIFEST_VERSION.to_string(),
                description: collection.description.clone(),
                author: collection.author.clone().unwrap_or_default(),
                last_updated: Utc::now().to_rfc3339(),
                repository: RepositoryInfo {
                    kind: provenance.repository_kind.clone(),
                    url: provenance.repository_url.clone(),
                    directory: provenance.directory.clone(),
                },
                license: String::new(),
                keywords: collection.tags.clone(),
            },
            common: CommonSection::default(),
            bundle_settings: BundleSettings::default(),
            prompts,
            mcp_servers: collection.mcp_servers.clone(),
        }
    }

    /// Synthesize the manifest for a packaged skill directory.
    pub fn for_skill(
        id: &str,
        name: &str,
        version: &str,
        description: &str,
        license: Option<&str>,
        provenance: &Provenance,
    ) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
            name: name.to_string(),
            metadata: ManifestMetadata {
                manifest_version: MANIFEST_VERSION.to_string(),
                description: description.to_string(),
                author: String::new(),
                last_updated: Utc::now().to_rfc3339(),
                repository: RepositoryInfo {
                    kind: provenance.repository_kind.clone(),
                    url: provenance.repository_url.clone(),
                    directory: provenance.directory.clone(),
                },
                license: license.unwrap_or_default().to_string(),
                keywords: vec!["skill".to_string()],
            },
            common: CommonSection::default(),
            bundle_settings: BundleSettings::default(),
            prompts: vec![PromptEntry {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                file: format!("skills/{id}/SKILL.md"),
                kind: "skill".to_string(),
                tags: vec!["skill".to_string()],
            }],
            mcp_servers: None,
        }
    }
}
