//! The core operator catalogue.
//!
//! Each operator is an [`LmModule`] built from a default signature; phase
//! modules add the typed wrappers that convert parsed fields into result
//! records. The tuner may swap an operator's module for one carrying a
//! proposed instruction without touching the rest of the catalogue.

pub mod generation;
pub mod tuning;
pub mod understanding;
pub mod validation;

use crate::lm::module::LmModule;

/// All operator modules, keyed by field.
#[derive(Debug, Clone)]
pub struct Operators {
    // Phase 1 — Understanding & Planning
    pub gather_requirements: LmModule,
    pub analyze_intent: LmModule,
    pub find_taxonomy_path: LmModule,
    pub analyze_dependencies: LmModule,
    pub synthesize_plan: LmModule,
    pub clarifying_questions: LmModule,

    // Phase 2 — Content Generation
    pub generate_content: LmModule,
    pub incorporate_feedback: LmModule,

    // Phase 3 — Validation & Refinement
    pub validate_compliance: LmModule,
    pub assess_quality: LmModule,
    pub refine_skill: LmModule,
    pub detect_style: LmModule,
    pub failure_analyzer: LmModule,
    pub signature_proposer: LmModule,
    pub signature_validator: LmModule,
}

impl Operators {
    /// Build the catalogue from the default signatures.
    pub fn new() -> Self {
        Self {
            gather_requirements: LmModule::new(understanding::gather_requirements_signature()),
            analyze_intent: LmModule::new(understanding::analyze_intent_signature()),
            find_taxonomy_path: LmModule::new(understanding::find_taxonomy_path_signature()),
            analyze_dependencies: LmModule::new(understanding::analyze_dependencies_signature()),
            synthesize_plan: LmModule::new(understanding::synthesize_plan_signature()),
            clarifying_questions: LmModule::new(
                understanding::clarifying_questions_signature(),
            ),
            generate_content: LmModule::new(generation::generate_content_signature()),
            incorporate_feedback: LmModule::new(generation::incorporate_feedback_signature()),
            validate_compliance: LmModule::new(validation::validate_compliance_signature()),
            assess_quality: LmModule::new(validation::assess_quality_signature()),
            refine_skill: LmModule::new(validation::refine_skill_signature()),
            detect_style: LmModule::new(validation::detect_style_signature()),
            failure_analyzer: LmModule::new(tuning::failure_analyzer_signature()),
            signature_proposer: LmModule::new(tuning::signature_proposer_signature()),
            signature_validator: LmModule::new(tuning::signature_validator_signature()),
        }
    }
}

impl Default for Operators {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_ids_are_distinct() {
        let ops = Operators::new();
        let ids = [
            ops.gather_requirements.signature().id.clone(),
            ops.analyze_intent.signature().id.clone(),
            ops.find_taxonomy_path.signature().id.clone(),
            ops.analyze_dependencies.signature().id.clone(),
            ops.synthesize_plan.signature().id.clone(),
            ops.clarifying_questions.signature().id.clone(),
            ops.generate_content.signature().id.clone(),
            ops.incorporate_feedback.signature().id.clone(),
            ops.validate_compliance.signature().id.clone(),
            ops.assess_quality.signature().id.clone(),
            ops.refine_skill.signature().id.clone(),
            ops.detect_style.signature().id.clone(),
            ops.failure_analyzer.signature().id.clone(),
            ops.signature_proposer.signature().id.clone(),
            ops.signature_validator.signature().id.clone(),
        ];
        let mut sorted = ids.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len(), "duplicate operator id in catalogue");
    }

    #[test]
    fn every_signature_declares_outputs() {
        let ops = Operators::new();
        for module in [
            &ops.gather_requirements,
            &ops.analyze_intent,
            &ops.find_taxonomy_path,
            &ops.analyze_dependencies,
            &ops.synthesize_plan,
            &ops.clarifying_questions,
            &ops.generate_content,
            &ops.incorporate_feedback,
            &ops.validate_compliance,
            &ops.assess_quality,
            &ops.refine_skill,
            &ops.detect_style,
            &ops.failure_analyzer,
            &ops.signature_proposer,
            &ops.signature_validator,
        ] {
            assert!(
                !module.signature().outputs.is_empty(),
                "{} has no outputs",
                module.signature().id
            );
        }
    }
}
