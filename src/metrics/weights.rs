//! Style-weighted quality scoring.
//!
//! Each detected skill style carries a fixed weight vector over the metric
//! family. Weights are normalized before application and the composite score
//! is the weighted sum of per-metric sub-scores.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillfabError};

/// Composite score below which refinement triggers (strictly below).
pub const REFINEMENT_THRESHOLD: f64 = 0.75;

/// Minimum composite improvement for a refinement or tuned signature to be
/// accepted.
pub const MIN_IMPROVEMENT: f64 = 0.05;

/// Maximum refinement iterations per job.
pub const MAX_REFINEMENTS: u32 = 3;

/// Maximum content revisions per job in the preview loop.
pub const MAX_REVISIONS: u32 = 3;

/// Maximum signature-tuning iterations per job.
pub const MAX_TUNING_ITERATIONS: u32 = 3;

/// Detected authoring style of a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillStyle {
    /// A hub page linking out to focused sub-skills
    NavigationHub,
    /// A full treatment of the topic
    #[default]
    Comprehensive,
    /// A terse, high-signal reference
    Minimal,
}

impl SkillStyle {
    /// Parse the snake_case tag, tolerating surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            "navigation_hub" => Ok(SkillStyle::NavigationHub),
            "comprehensive" => Ok(SkillStyle::Comprehensive),
            "minimal" => Ok(SkillStyle::Minimal),
            other => Err(SkillfabError::InvalidInput(format!(
                "unknown skill style {:?}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillStyle::NavigationHub => "navigation_hub",
            SkillStyle::Comprehensive => "comprehensive",
            SkillStyle::Minimal => "minimal",
        }
    }
}

impl std::fmt::Display for SkillStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-metric sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricScores {
    pub skill_quality: f64,
    pub semantic_f1: f64,
    pub entity_f1: f64,
    pub readability: f64,
    pub coverage: f64,
}

impl MetricScores {
    /// A uniform score across the family, useful for fixtures.
    pub fn uniform(value: f64) -> Self {
        Self {
            skill_quality: value,
            semantic_f1: value,
            entity_f1: value,
            readability: value,
            coverage: value,
        }
    }
}

/// A weight vector over the metric family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub skill_quality: f64,
    pub semantic_f1: f64,
    pub entity_f1: f64,
    pub readability: f64,
    pub coverage: f64,
}

impl MetricWeights {
    /// The fixed table row for a style. Rows sum to 1.0.
    pub fn for_style(style: SkillStyle) -> Self {
        match style {
            SkillStyle::NavigationHub => Self {
                skill_quality: 0.30,
                semantic_f1: 0.15,
                entity_f1: 0.05,
                readability: 0.35,
                coverage: 0.15,
            },
            SkillStyle::Comprehensive => Self {
                skill_quality: 0.25,
                semantic_f1: 0.25,
                entity_f1: 0.20,
                readability: 0.20,
                coverage: 0.10,
            },
            SkillStyle::Minimal => Self {
                skill_quality: 0.20,
                semantic_f1: 0.50,
                entity_f1: 0.15,
                readability: 0.10,
                coverage: 0.05,
            },
        }
    }

    fn sum(&self) -> f64 {
        self.skill_quality + self.semantic_f1 + self.entity_f1 + self.readability + self.coverage
    }

    /// Normalize to sum 1.0. A degenerate all-zero vector falls back to the
    /// comprehensive row.
    pub fn normalized(&self) -> Self {
        let total = self.sum();
        if total <= f64::EPSILON {
            return Self::for_style(SkillStyle::Comprehensive);
        }
        Self {
            skill_quality: self.skill_quality / total,
            semantic_f1: self.semantic_f1 / total,
            entity_f1: self.entity_f1 / total,
            readability: self.readability / total,
            coverage: self.coverage / total,
        }
    }

    /// Weighted composite of a score vector, normalizing weights first.
    pub fn composite(&self, scores: &MetricScores) -> f64 {
        let w = self.normalized();
        w.skill_quality * scores.skill_quality
            + w.semantic_f1 * scores.semantic_f1
            + w.entity_f1 * scores.entity_f1
            + w.readability * scores.readability
            + w.coverage * scores.coverage
    }
}

/// Composite score for a style, straight from the table.
pub fn composite_for_style(style: SkillStyle, scores: &MetricScores) -> f64 {
    MetricWeights::for_style(style).composite(scores)
}

/// Whether a composite score triggers the refinement path.
///
/// Exactly the threshold does not trigger; strictly below does.
pub fn needs_refinement(composite: f64) -> bool {
    composite < REFINEMENT_THRESHOLD
}
