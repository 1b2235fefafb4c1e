//! Curated collection manifests (`*.collection.yml`).

use serde::{Deserialize, Serialize};

use crate::error::{BhError, Result};
use crate::util::title_case;

/// File suffix that marks a collection manifest.
pub const COLLECTION_SUFFIX: &str = ".collection.yml";

/// One curated, independently authored list of items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionManifest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub items: Vec<CollectionItem>,
    /// Free-form presentation hints, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<serde_yaml::Value>,
    /// Embedded sub-service definitions, passed through into the
    /// deployment manifest verbatim
    #[serde(
        default,
        alias = "mcp",
        rename = "mcpServers",
        skip_serializing_if = "Option::is_none"
    )]
    pub mcp_servers: Option<serde_yaml::Value>,
}

/// One referenced artifact inside a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionItem {
    /// Path relative to the collection repository root
    pub path: String,
    pub kind: ItemKind,
}

/// Artifact kind tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Prompt,
    Instruction,
    ChatMode,
    Agent,
    Skill,
    /// Kinds this version does not know about; treated as prompts
    #[serde(other)]
    Unknown,
}

impl ItemKind {
    /// Manifest `type` value for this kind.
    pub fn manifest_type(self) -> &'static str {
        match self {
            ItemKind::Prompt | ItemKind::Unknown => "prompt",
            ItemKind::Instruction => "instructions",
            ItemKind::ChatMode => "chatmode",
            ItemKind::Agent => "agent",
            ItemKind::Skill => "skill",
        }
    }

    /// Filename suffix stripped when deriving an item id.
    fn id_suffixes(self) -> &'static [&'static str] {
        match self {
            ItemKind::Prompt | ItemKind::Unknown => &[".prompt.md", ".md"],
            ItemKind::Instruction => &[".instructions.md", ".md"],
            ItemKind::ChatMode => &[".chatmode.md", ".md"],
            ItemKind::Agent => &[".agent.md", ".md"],
            ItemKind::Skill => &[".skill.md", ".md"],
        }
    }
}

impl CollectionItem {
    /// Filename component of the item path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Id derived by stripping the kind-specific suffix from the filename.
    pub fn item_id(&self) -> String {
        let name = self.file_name();
        for suffix in self.kind.id_suffixes() {
            if let Some(stripped) = name.strip_suffix(suffix) {
                if !stripped.is_empty() {
                    return stripped.to_string();
                }
            }
        }
        name.to_string()
    }

    /// Display name derived from the item id.
    pub fn display_name(&self) -> String {
        title_case(&self.item_id())
    }
}

impl CollectionManifest {
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(input).map_err(|err| {
            BhError::ValidationFailed(format!("collection manifest parse error: {err}"))
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(BhError::ValidationFailed(
                "collection id must be non-empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(BhError::ValidationFailed(format!(
                "collection {} name must be non-empty",
                self.id
            )));
        }
        for item in &self.items {
            if item.path.trim().is_empty() {
                return Err(BhError::ValidationFailed(format!(
                    "collection {} has an item with an empty path",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub fn version_or_default(&self) -> String {
        self.version
            .clone()
            .unwrap_or_else(|| "1.0.0".to_string())
    }
}
