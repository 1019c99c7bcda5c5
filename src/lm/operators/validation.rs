//! Phase 3 operators: compliance validation, quality assessment, refinement,
//! and style detection.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lm::client::LmClient;
use crate::lm::module::LmModule;
use crate::lm::signature::{FieldType, Signature};
use crate::metrics::weights::{MetricScores, SkillStyle};

pub fn validate_compliance_signature() -> Signature {
    Signature::new(
        "validate_compliance",
        "Check the skill artifact against the authoring rules: frontmatter \
         constraints, kebab-case naming, description bounds, well-formed \
         Markdown sections, and the declared style. Report critical issues \
         (must fix) separately from warnings.",
    )
    .input("name", "Proposed skill name")
    .input("description", "Proposed frontmatter description")
    .input("body", "The Markdown body")
    .output("pass", "Whether the artifact is compliant", FieldType::Boolean)
    .output("score", "Compliance score in [0,1]", FieldType::Number)
    .output("critical_issues", "Issues that must be fixed", FieldType::List)
    .output("warnings", "Non-blocking concerns", FieldType::List)
}

pub fn assess_quality_signature() -> Signature {
    Signature::new(
        "assess_quality",
        "Score the skill draft against the plan on each metric, each in \
         [0,1]: skill_quality (overall craft), semantic_f1 (does it say what \
         the plan requires), entity_f1 (are the named tools/APIs/concepts \
         correct), readability, and coverage of the outline.",
    )
    .input("body", "The Markdown body")
    .input("plan_summary", "What the skill was planned to contain")
    .output("skill_quality", "Overall craft score", FieldType::Number)
    .output("semantic_f1", "Semantic agreement with the plan", FieldType::Number)
    .output("entity_f1", "Correctness of named entities", FieldType::Number)
    .output("readability", "Readability score", FieldType::Number)
    .output("coverage", "Outline coverage score", FieldType::Number)
}

pub fn refine_skill_signature() -> Signature {
    Signature::new(
        "refine_skill",
        "Rewrite the skill body to resolve the listed issues, most critical \
         first, without regressing sections that had no issues. List the \
         issues you addressed.",
    )
    .input("body", "The current draft body")
    .input("issues", "Issues to resolve, most critical first")
    .output("body", "The refined Markdown body", FieldType::Text)
    .output("addressed", "Issues actually addressed", FieldType::List)
}

pub fn detect_style_signature() -> Signature {
    Signature::new(
        "detect_skill_style",
        "Classify the document's authoring style: navigation_hub (links out \
         to focused sub-topics), comprehensive (in-depth treatment), or \
         minimal (terse reference).",
    )
    .input("body", "The Markdown body")
    .output("style", "navigation_hub, comprehensive, or minimal", FieldType::Text)
    .output("confidence", "Classification confidence in [0,1]", FieldType::Number)
    .output("rationale", "One-sentence justification", FieldType::Text)
}

/// Output of ValidateCompliance.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ComplianceReport {
    pub pass: bool,
    pub score: f64,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Output of AssessQuality: the per-metric sub-scores.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct QualityReport {
    pub scores: MetricScores,
}

/// Output of RefineSkill.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RefinedContent {
    pub body: String,
    pub addressed: Vec<String>,
}

/// Output of DetectSkillStyle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleDetection {
    pub style: SkillStyle,
    pub confidence: f64,
    pub rationale: String,
}

pub async fn validate_compliance(
    module: &LmModule,
    client: &LmClient,
    name: &str,
    description: &str,
    body: &str,
) -> Result<ComplianceReport> {
    let output = module
        .invoke(
            client,
            &[("name", name), ("description", description), ("body", body)],
        )
        .await?;
    Ok(ComplianceReport {
        pass: output.require_bool("pass")?,
        score: output.require_unit_score("score")?,
        critical_issues: output.require_list("critical_issues")?,
        warnings: output.require_list("warnings")?,
    })
}

pub async fn assess_quality(
    module: &LmModule,
    client: &LmClient,
    body: &str,
    plan_summary: &str,
) -> Result<QualityReport> {
    let output = module
        .invoke(client, &[("body", body), ("plan_summary", plan_summary)])
        .await?;
    Ok(QualityReport {
        scores: MetricScores {
            skill_quality: output.require_unit_score("skill_quality")?,
            semantic_f1: output.require_unit_score("semantic_f1")?,
            entity_f1: output.require_unit_score("entity_f1")?,
            readability: output.require_unit_score("readability")?,
            coverage: output.require_unit_score("coverage")?,
        },
    })
}

pub async fn refine_skill(
    module: &LmModule,
    client: &LmClient,
    body: &str,
    issues: &[String],
) -> Result<RefinedContent> {
    let output = module
        .invoke(client, &[("body", body), ("issues", &issues.join("\n"))])
        .await?;
    Ok(RefinedContent {
        body: output.require_str("body")?,
        addressed: output.require_list("addressed")?,
    })
}

pub async fn detect_skill_style(
    module: &LmModule,
    client: &LmClient,
    body: &str,
) -> Result<StyleDetection> {
    let output = module.invoke(client, &[("body", body)]).await?;
    let style_raw = output.require_str("style")?;
    Ok(StyleDetection {
        style: SkillStyle::parse(&style_raw).map_err(|_| {
            crate::error::SkillfabError::LmPermanent(format!(
                "detect_skill_style returned unknown style {:?}",
                style_raw
            ))
        })?,
        confidence: output.require_unit_score("confidence")?,
        rationale: output.require_str("rationale")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::client::ScriptedReply;
    use serde_json::json;

    #[tokio::test]
    async fn compliance_report_maps_fields() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "pass": false,
            "score": 0.6,
            "critical_issues": ["description exceeds bounds"],
            "warnings": ["body has a single section"],
        }))]);
        let module = LmModule::new(validate_compliance_signature());
        let report = validate_compliance(&module, &client, "n", "d", "b")
            .await
            .unwrap();
        assert!(!report.pass);
        assert_eq!(report.critical_issues.len(), 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[tokio::test]
    async fn quality_scores_are_clamped() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "skill_quality": 1.4,
            "semantic_f1": -0.1,
            "entity_f1": 0.5,
            "readability": 0.9,
            "coverage": 0.8,
        }))]);
        let module = LmModule::new(assess_quality_signature());
        let report = assess_quality(&module, &client, "b", "p").await.unwrap();
        assert_eq!(report.scores.skill_quality, 1.0);
        assert_eq!(report.scores.semantic_f1, 0.0);
        assert_eq!(report.scores.entity_f1, 0.5);
    }

    #[tokio::test]
    async fn style_detection_rejects_unknown_styles() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "style": "florid",
            "confidence": 0.9,
            "rationale": "r",
        }))]);
        let module = LmModule::new(detect_style_signature());
        let err = detect_skill_style(&module, &client, "b").await.unwrap_err();
        assert_eq!(err.kind(), "lm_permanent");
    }

    #[tokio::test]
    async fn style_detection_maps_fields() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "style": "navigation_hub",
            "confidence": 0.77,
            "rationale": "mostly links",
        }))]);
        let module = LmModule::new(detect_style_signature());
        let detection = detect_skill_style(&module, &client, "b").await.unwrap();
        assert_eq!(detection.style, SkillStyle::NavigationHub);
        assert!((detection.confidence - 0.77).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refinement_returns_addressed_issues() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "body": "# Better\n",
            "addressed": ["expanded overview"],
        }))]);
        let module = LmModule::new(refine_skill_signature());
        let refined = refine_skill(&module, &client, "# Draft\n", &["thin overview".into()])
            .await
            .unwrap();
        assert_eq!(refined.addressed, vec!["expanded overview"]);
    }
}
