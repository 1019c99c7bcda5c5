//! SKILL.md frontmatter parsing and rendering.
//!
//! The artifact starts with a YAML block between `---` delimiters, followed
//! by the Markdown body. Parsing validates the required fields; rendering is
//! the exact inverse so a written artifact loads back equal.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillfabError};
use crate::taxonomy::path::{is_valid_name, TaxonomyPath};

/// Maximum description length.
pub const MAX_DESCRIPTION_LEN: usize = 1024;

/// Enumerated skill type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillType {
    /// Reference material (lookup tables, cheat sheets)
    #[default]
    Reference,
    /// Step-by-step guidance
    Guide,
    /// Reusable starting point
    Template,
    /// A capability description for consumer agents
    Capability,
}

/// Relative weight of a skill when assembled into a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillWeight {
    Light,
    #[default]
    Medium,
    Heavy,
}

/// When a consumer should load the skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadPriority {
    Eager,
    #[default]
    Lazy,
    OnDemand,
}

/// The `metadata:` block nested inside the frontmatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDescriptor {
    /// Slash-delimited taxonomy path
    pub skill_id: TaxonomyPath,
    /// Semver version string
    pub version: String,
    /// Skill type tag
    #[serde(rename = "type")]
    pub skill_type: SkillType,
    /// Weight tag
    pub weight: SkillWeight,
    /// Load priority tag
    #[serde(default)]
    pub load_priority: LoadPriority,
    /// Other skill identifiers this skill depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaxonomyPath>,
    /// Short capability strings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

/// The full frontmatter header of a SKILL.md artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillFrontmatter {
    /// Kebab-case name, 1-64 chars
    pub name: String,
    /// Free-text description, 1-1024 chars
    pub description: String,
    /// Nested descriptor block
    pub metadata: SkillDescriptor,
}

impl SkillFrontmatter {
    /// Validate field constraints.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_name(&self.name) {
            return Err(SkillfabError::MalformedArtifact(format!(
                "name {:?} is not kebab-case (1-64 chars)",
                self.name
            )));
        }
        if self.description.is_empty() || self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(SkillfabError::MalformedArtifact(format!(
                "description length {} outside 1-{}",
                self.description.len(),
                MAX_DESCRIPTION_LEN
            )));
        }
        Ok(())
    }
}

/// A parsed skill artifact: frontmatter plus Markdown body.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillArtifact {
    pub frontmatter: SkillFrontmatter,
    pub body: String,
}

impl SkillArtifact {
    /// Parse a full SKILL.md document.
    pub fn parse(content: &str) -> Result<Self> {
        let rest = content.strip_prefix("---\n").ok_or_else(|| {
            SkillfabError::MalformedArtifact("missing frontmatter opening delimiter".into())
        })?;

        // The closing delimiter is a line consisting of exactly `---`.
        let end = rest.find("\n---\n").or_else(|| {
            rest.strip_suffix("\n---").map(|head| head.len())
        });
        let end = end.ok_or_else(|| {
            SkillfabError::MalformedArtifact("missing frontmatter closing delimiter".into())
        })?;

        let (header, tail) = rest.split_at(end);
        let body = tail
            .strip_prefix("\n---\n")
            .or_else(|| tail.strip_prefix("\n---"))
            .unwrap_or("")
            .trim_start_matches('\n')
            .to_string();

        let frontmatter: SkillFrontmatter = serde_yaml::from_str(header)
            .map_err(|e| SkillfabError::MalformedArtifact(format!("bad frontmatter: {}", e)))?;
        frontmatter.validate()?;

        Ok(Self { frontmatter, body })
    }

    /// Render back into the on-disk SKILL.md form.
    pub fn render(&self) -> Result<String> {
        self.frontmatter.validate()?;
        let yaml = serde_yaml::to_string(&self.frontmatter)
            .map_err(|e| SkillfabError::MalformedArtifact(format!("frontmatter render: {}", e)))?;
        Ok(format!("---\n{}---\n\n{}", yaml, self.body))
    }
}
