//! Style-adaptive quality metrics.

pub mod weights;

pub use weights::{
    composite_for_style, needs_refinement, MetricScores, MetricWeights, SkillStyle,
    MAX_REFINEMENTS, MAX_REVISIONS, MAX_TUNING_ITERATIONS, MIN_IMPROVEMENT,
    REFINEMENT_THRESHOLD,
};
