//! Signature-tuning operators: failure analysis, candidate proposal, and
//! candidate validation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lm::client::LmClient;
use crate::lm::module::LmModule;
use crate::lm::signature::{FieldType, Signature};

pub fn failure_analyzer_signature() -> Signature {
    Signature::new(
        "failure_analyzer",
        "Analyze why the operator's outputs scored poorly. Name the concrete \
         failure modes (missing sections, wrong register, factual drift, \
         outline deviation) rather than restating the scores.",
    )
    .input("operator_instruction", "The instruction the operator ran with")
    .input("low_scoring_output", "The output that scored poorly")
    .input("issues", "Validator issues and low metric names")
    .output("summary", "One-paragraph failure description", FieldType::Text)
    .output("failure_modes", "Distinct failure modes observed", FieldType::List)
}

pub fn signature_proposer_signature() -> Signature {
    Signature::new(
        "signature_proposer",
        "Rewrite the operator instruction to address the failure description. \
         Keep the contract identical: same inputs, same outputs, same JSON \
         reply shape. Change only how the work is directed.",
    )
    .input("current_instruction", "The instruction to improve")
    .input("failure_summary", "Why the current instruction underperforms")
    .input("failure_modes", "Distinct failure modes to address")
    .output("instruction", "The improved instruction", FieldType::Text)
    .output("rationale", "Why this should score better", FieldType::Text)
}

pub fn signature_validator_signature() -> Signature {
    Signature::new(
        "signature_validator",
        "Judge whether the candidate instruction is a well-formed replacement: \
         it must direct the same task, preserve the declared output fields, \
         and not be degenerate (empty, trivially short, or a refusal).",
    )
    .input("original_instruction", "The instruction being replaced")
    .input("candidate_instruction", "The proposed replacement")
    .input("output_fields", "Declared output field names, one per line")
    .output("valid", "Whether the candidate is acceptable", FieldType::Boolean)
    .output("problems", "Problems found, empty when valid", FieldType::List)
}

/// Output of FailureAnalyzer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FailureAnalysis {
    pub summary: String,
    pub failure_modes: Vec<String>,
}

/// Output of SignatureProposer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SignatureProposal {
    pub instruction: String,
    pub rationale: String,
}

/// Output of SignatureValidator.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SignatureVerdict {
    pub valid: bool,
    pub problems: Vec<String>,
}

pub async fn analyze_failures(
    module: &LmModule,
    client: &LmClient,
    operator_instruction: &str,
    low_scoring_output: &str,
    issues: &[String],
) -> Result<FailureAnalysis> {
    let output = module
        .invoke(
            client,
            &[
                ("operator_instruction", operator_instruction),
                ("low_scoring_output", low_scoring_output),
                ("issues", &issues.join("\n")),
            ],
        )
        .await?;
    Ok(FailureAnalysis {
        summary: output.require_str("summary")?,
        failure_modes: output.require_list("failure_modes")?,
    })
}

pub async fn propose_signature(
    module: &LmModule,
    client: &LmClient,
    current_instruction: &str,
    analysis: &FailureAnalysis,
) -> Result<SignatureProposal> {
    let output = module
        .invoke(
            client,
            &[
                ("current_instruction", current_instruction),
                ("failure_summary", &analysis.summary),
                ("failure_modes", &analysis.failure_modes.join("\n")),
            ],
        )
        .await?;
    Ok(SignatureProposal {
        instruction: output.require_str("instruction")?,
        rationale: output.require_str("rationale")?,
    })
}

pub async fn validate_signature(
    module: &LmModule,
    client: &LmClient,
    original: &Signature,
    candidate_instruction: &str,
) -> Result<SignatureVerdict> {
    let field_names = original
        .outputs
        .iter()
        .map(|f| f.name.clone())
        .collect::<Vec<_>>()
        .join("\n");
    let output = module
        .invoke(
            client,
            &[
                ("original_instruction", &original.instruction),
                ("candidate_instruction", candidate_instruction),
                ("output_fields", &field_names),
            ],
        )
        .await?;
    Ok(SignatureVerdict {
        valid: output.require_bool("valid")?,
        problems: output.require_list("problems")?,
    })
}

/// Mechanical well-formedness checks applied before the LM verdict.
///
/// Degenerate candidates never reach the validator operator.
pub fn candidate_is_degenerate(original: &Signature, candidate_instruction: &str) -> bool {
    let trimmed = candidate_instruction.trim();
    trimmed.len() < 20 || trimmed == original.instruction.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::client::ScriptedReply;
    use serde_json::json;

    #[tokio::test]
    async fn analysis_maps_fields() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "summary": "outputs skip the outline",
            "failure_modes": ["outline deviation", "thin sections"],
        }))]);
        let module = LmModule::new(failure_analyzer_signature());
        let analysis = analyze_failures(&module, &client, "instr", "output", &[])
            .await
            .unwrap();
        assert_eq!(analysis.failure_modes.len(), 2);
    }

    #[tokio::test]
    async fn proposal_maps_fields() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "instruction": "Write the body following every outline heading in order.",
            "rationale": "forces coverage",
        }))]);
        let module = LmModule::new(signature_proposer_signature());
        let proposal = propose_signature(
            &module,
            &client,
            "old",
            &FailureAnalysis {
                summary: "s".into(),
                failure_modes: vec![],
            },
        )
        .await
        .unwrap();
        assert!(proposal.instruction.contains("outline"));
    }

    #[tokio::test]
    async fn verdict_maps_fields() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "valid": false,
            "problems": ["candidate drops the description field"],
        }))]);
        let module = LmModule::new(signature_validator_signature());
        let original = Signature::new("x", "original instruction text here")
            .output("body", "d", FieldType::Text);
        let verdict = validate_signature(&module, &client, &original, "candidate")
            .await
            .unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.problems.len(), 1);
    }

    #[test]
    fn degenerate_candidates_are_caught_mechanically() {
        let original = Signature::new("x", "a sufficiently long original instruction");
        assert!(candidate_is_degenerate(&original, ""));
        assert!(candidate_is_degenerate(&original, "too short"));
        assert!(candidate_is_degenerate(
            &original,
            "a sufficiently long original instruction"
        ));
        assert!(!candidate_is_degenerate(
            &original,
            "a genuinely different instruction that changes the approach"
        ));
    }
}
