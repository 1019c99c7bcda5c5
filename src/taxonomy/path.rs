//! Taxonomy path value object and skill name derivation.
//!
//! Paths are slash-delimited (`development/languages/python/async`) and are
//! validated on construction. `.` and `..` are never treated as path
//! operators; they simply fail the segment character check.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SkillfabError};

/// Maximum length of a derived skill name.
pub const MAX_NAME_LEN: usize = 64;

/// A validated, normalized taxonomy path.
///
/// Two paths are equal iff their normalized strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaxonomyPath(String);

impl TaxonomyPath {
    /// Validate and normalize a raw path string.
    ///
    /// Rejects leading/trailing whitespace, empty segments, and any segment
    /// containing a character outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(SkillfabError::InvalidInput("empty taxonomy path".into()));
        }
        if raw != raw.trim() {
            return Err(SkillfabError::InvalidInput(format!(
                "taxonomy path has surrounding whitespace: {:?}",
                raw
            )));
        }

        let segments: Vec<&str> = raw.split('/').collect();
        for segment in &segments {
            if segment.is_empty() {
                return Err(SkillfabError::InvalidInput(format!(
                    "taxonomy path has an empty segment: {:?}",
                    raw
                )));
            }
            if !segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(SkillfabError::InvalidInput(format!(
                    "taxonomy segment {:?} contains disallowed characters",
                    segment
                )));
            }
        }

        Ok(Self(segments.join("/")))
    }

    /// The normalized string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    /// Derived kebab-case skill name for this path.
    pub fn skill_name(&self) -> String {
        name_from_id(&self.0)
    }
}

impl fmt::Display for TaxonomyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaxonomyPath {
    type Err = SkillfabError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for TaxonomyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TaxonomyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TaxonomyPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Derive a kebab-case skill name from a taxonomy id.
///
/// Takes the last two informative segments (leading underscores stripped,
/// segments that become empty dropped), lowercases, maps `_` to `-`, joins
/// with `-`, and trims to a `[a-z][a-z0-9-]{0,63}` shape. Deterministic and
/// idempotent.
pub fn name_from_id(id: &str) -> String {
    let informative: Vec<String> = id
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_start_matches('_'))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_lowercase().replace('_', "-"))
        .collect();

    let picked = if informative.len() >= 2 {
        informative[informative.len() - 2..].join("-")
    } else {
        informative.into_iter().next_back().unwrap_or_default()
    };

    let mut name: String = picked
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();

    // The name must start with a letter.
    while let Some(first) = name.chars().next() {
        if first.is_ascii_lowercase() {
            break;
        }
        name.remove(0);
    }
    name.truncate(MAX_NAME_LEN);

    if name.is_empty() {
        "skill".to_string()
    } else {
        name
    }
}

/// Check that a string is a valid kebab-case skill name.
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
