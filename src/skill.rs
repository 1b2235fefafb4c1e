//! `SKILL.md` parsing.
//!
//! A skill is a directory whose `SKILL.md` starts with a `---`-delimited
//! YAML frontmatter block followed by the markdown instruction body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BhError, Result};

/// Marker file that identifies a skill directory.
pub const SKILL_FILE: &str = "SKILL.md";

/// Parsed frontmatter of a `SKILL.md`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillFrontmatter {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Fields this version does not model are carried, not rejected
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Split a `SKILL.md` into frontmatter and markdown body.
pub fn parse_skill_md(content: &str) -> Result<(SkillFrontmatter, &str)> {
    let rest = content
        .strip_prefix("---")
        .ok_or_else(|| BhError::ValidationFailed(
            "SKILL.md must start with a --- frontmatter block".to_string(),
        ))?;
    let rest = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")).ok_or_else(|| {
        BhError::ValidationFailed("SKILL.md frontmatter delimiter must end the line".to_string())
    })?;

    let end = rest.find("\n---").ok_or_else(|| {
        BhError::ValidationFailed("SKILL.md frontmatter block is not closed".to_string())
    })?;
    let frontmatter_src = &rest[..end];
    let body = rest[end + 4..].trim_start_matches(['-']).trim_start_matches(['\r', '\n']);

    let frontmatter: SkillFrontmatter = serde_yaml::from_str(frontmatter_src).map_err(|err| {
        BhError::ValidationFailed(format!("SKILL.md frontmatter parse error: {err}"))
    })?;
    if frontmatter.name.trim().is_empty() {
        return Err(BhError::ValidationFailed(
            "SKILL.md frontmatter requires a non-empty name".to_string(),
        ));
    }
    Ok((frontmatter, body))
}
