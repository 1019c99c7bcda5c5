//! Phase 1 operators: requirements, intent, taxonomy placement,
//! dependencies, planning, and clarifying questions.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillfabError};
use crate::lm::client::LmClient;
use crate::lm::module::LmModule;
use crate::lm::signature::{FieldType, Signature};
use crate::metrics::weights::SkillStyle;
use crate::taxonomy::TaxonomyPath;

/// Ambiguities shorter than this (after trimming) are treated as noise and
/// never raise a clarification checkpoint.
pub const AMBIGUITY_NOISE_LEN: usize = 10;

pub fn gather_requirements_signature() -> Signature {
    Signature::new(
        "gather_requirements",
        "Extract the concrete requirements for authoring a skill from the task \
         description. List what the skill must cover, note genuine ambiguities \
         that block authoring, and record the assumptions you made.",
    )
    .input("task_description", "The user's free-form request")
    .input("user_context", "Optional extra context from the user")
    .output("requirements", "Concrete requirements the skill must satisfy", FieldType::List)
    .output("ambiguities", "Open ambiguities that need user input", FieldType::List)
    .output("assumptions", "Assumptions made in lieu of asking", FieldType::List)
}

pub fn analyze_intent_signature() -> Signature {
    Signature::new(
        "analyze_intent",
        "Determine what the requester actually wants this skill for: the core \
         intent, the audience who will consume it, and the goals it serves.",
    )
    .input("task_description", "The user's free-form request")
    .output("intent", "One-sentence statement of intent", FieldType::Text)
    .output("audience", "Who will consume the skill", FieldType::Text)
    .output("goals", "Goals the skill serves", FieldType::List)
}

pub fn find_taxonomy_path_signature() -> Signature {
    Signature::new(
        "find_taxonomy_path",
        "Choose the best taxonomy placement for this skill. The path is \
         slash-delimited with segments of letters, digits, underscores, and \
         hyphens only. Prefer existing branches over inventing new ones.",
    )
    .input("task_description", "The user's free-form request")
    .input("existing_paths", "Currently occupied taxonomy paths, one per line")
    .output("path", "Proposed slash-delimited taxonomy path", FieldType::Text)
    .output("rationale", "Why this placement", FieldType::Text)
    .output("confidence", "Placement confidence in [0,1]", FieldType::Number)
}

pub fn analyze_dependencies_signature() -> Signature {
    Signature::new(
        "analyze_dependencies",
        "Identify skills this one should depend on and the capabilities it \
         will provide to consumers.",
    )
    .input("task_description", "The user's free-form request")
    .input("existing_paths", "Currently occupied taxonomy paths, one per line")
    .output("dependencies", "Taxonomy ids of prerequisite skills", FieldType::List)
    .output("capabilities", "Short capability strings", FieldType::List)
}

pub fn synthesize_plan_signature() -> Signature {
    Signature::new(
        "synthesize_plan",
        "Synthesize an authoring plan from the analysis results. Produce a \
         summary of the skill to write and an ordered section outline. If the \
         request or analysis implies an authoring style, name it; otherwise \
         answer \"unspecified\".",
    )
    .input("requirements", "Requirements list")
    .input("intent", "Intent statement")
    .input("taxonomy_path", "Chosen taxonomy path")
    .input("dependencies", "Dependency list")
    .input("clarifications", "User answers to clarifying questions, if any")
    .output("summary", "What the skill will contain", FieldType::Text)
    .output("outline", "Ordered section headings", FieldType::List)
    .output(
        "style",
        "navigation_hub, comprehensive, minimal, or unspecified",
        FieldType::Text,
    )
}

pub fn clarifying_questions_signature() -> Signature {
    Signature::new(
        "generate_clarifying_questions",
        "Turn the listed ambiguities into direct questions for the requester. \
         Ask only what blocks authoring; never pad the list.",
    )
    .input("task_description", "The user's free-form request")
    .input("ambiguities", "Ambiguities found during requirements gathering")
    .output("questions", "Questions for the user", FieldType::List)
}

/// Output of GatherRequirements.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RequirementsReport {
    pub requirements: Vec<String>,
    pub ambiguities: Vec<String>,
    pub assumptions: Vec<String>,
}

impl RequirementsReport {
    /// Ambiguities that are substantial enough to block authoring.
    pub fn blocking_ambiguities(&self) -> Vec<&str> {
        self.ambiguities
            .iter()
            .map(String::as_str)
            .filter(|a| a.trim().len() > AMBIGUITY_NOISE_LEN)
            .collect()
    }
}

/// Output of AnalyzeIntent.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IntentReport {
    pub intent: String,
    pub audience: String,
    pub goals: Vec<String>,
}

/// Output of FindTaxonomyPath.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathProposal {
    pub path: TaxonomyPath,
    pub rationale: String,
    pub confidence: f64,
}

/// Output of AnalyzeDependencies.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DependencyReport {
    pub dependencies: Vec<String>,
    pub capabilities: Vec<String>,
}

/// Output of SynthesizePlan.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SkillPlan {
    pub summary: String,
    pub outline: Vec<String>,
    /// Style named by the plan, when the request implied one
    pub style: Option<SkillStyle>,
}

pub async fn gather_requirements(
    module: &LmModule,
    client: &LmClient,
    task_description: &str,
    user_context: &str,
) -> Result<RequirementsReport> {
    let output = module
        .invoke(
            client,
            &[
                ("task_description", task_description),
                ("user_context", user_context),
            ],
        )
        .await?;
    Ok(RequirementsReport {
        requirements: output.require_list("requirements")?,
        ambiguities: output.require_list("ambiguities")?,
        assumptions: output.require_list("assumptions")?,
    })
}

pub async fn analyze_intent(
    module: &LmModule,
    client: &LmClient,
    task_description: &str,
) -> Result<IntentReport> {
    let output = module
        .invoke(client, &[("task_description", task_description)])
        .await?;
    Ok(IntentReport {
        intent: output.require_str("intent")?,
        audience: output.require_str("audience")?,
        goals: output.require_list("goals")?,
    })
}

pub async fn find_taxonomy_path(
    module: &LmModule,
    client: &LmClient,
    task_description: &str,
    existing_paths: &str,
) -> Result<PathProposal> {
    let output = module
        .invoke(
            client,
            &[
                ("task_description", task_description),
                ("existing_paths", existing_paths),
            ],
        )
        .await?;
    let raw = output.require_str("path")?;
    // A placement that fails sanitization is malformed model output.
    let path = TaxonomyPath::parse(raw.trim()).map_err(|e| {
        SkillfabError::LmPermanent(format!("find_taxonomy_path proposed a bad path: {}", e))
    })?;
    Ok(PathProposal {
        path,
        rationale: output.require_str("rationale")?,
        confidence: output.require_unit_score("confidence")?,
    })
}

pub async fn analyze_dependencies(
    module: &LmModule,
    client: &LmClient,
    task_description: &str,
    existing_paths: &str,
) -> Result<DependencyReport> {
    let output = module
        .invoke(
            client,
            &[
                ("task_description", task_description),
                ("existing_paths", existing_paths),
            ],
        )
        .await?;
    Ok(DependencyReport {
        dependencies: output.require_list("dependencies")?,
        capabilities: output.require_list("capabilities")?,
    })
}

pub async fn synthesize_plan(
    module: &LmModule,
    client: &LmClient,
    requirements: &RequirementsReport,
    intent: &IntentReport,
    path: &PathProposal,
    dependencies: &DependencyReport,
    clarifications: &str,
) -> Result<SkillPlan> {
    let output = module
        .invoke(
            client,
            &[
                ("requirements", &requirements.requirements.join("\n")),
                ("intent", &intent.intent),
                ("taxonomy_path", path.path.as_str()),
                ("dependencies", &dependencies.dependencies.join("\n")),
                ("clarifications", clarifications),
            ],
        )
        .await?;
    let style_raw = output.require_str("style")?;
    Ok(SkillPlan {
        summary: output.require_str("summary")?,
        outline: output.require_list("outline")?,
        style: SkillStyle::parse(&style_raw).ok(),
    })
}

pub async fn generate_clarifying_questions(
    module: &LmModule,
    client: &LmClient,
    task_description: &str,
    ambiguities: &[String],
) -> Result<Vec<String>> {
    let output = module
        .invoke(
            client,
            &[
                ("task_description", task_description),
                ("ambiguities", &ambiguities.join("\n")),
            ],
        )
        .await?;
    output.require_list("questions")
}
