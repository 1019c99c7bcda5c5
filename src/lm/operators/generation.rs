//! Phase 2 operators: content generation and feedback incorporation.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::lm::client::LmClient;
use crate::lm::module::LmModule;
use crate::lm::signature::{FieldType, Signature};
use crate::metrics::weights::SkillStyle;

pub fn generate_content_signature() -> Signature {
    Signature::new(
        "generate_skill_content",
        "Write the full SKILL.md body for the planned skill in the requested \
         style. navigation_hub links out to focused sub-topics, comprehensive \
         covers the topic in depth, minimal is a terse high-signal reference. \
         Follow the outline. Also produce the kebab-case name and a one-to-two \
         sentence description for the frontmatter.",
    )
    .input("summary", "What the skill should contain")
    .input("outline", "Ordered section headings")
    .input("style", "Authoring style tag")
    .input("taxonomy_path", "Where the skill will live")
    .input("suggested_name", "Derived kebab-case name to use unless unfit")
    .output("name", "Kebab-case skill name, 1-64 chars", FieldType::Text)
    .output("description", "Frontmatter description, 1-1024 chars", FieldType::Text)
    .output("body", "The full Markdown body", FieldType::Text)
}

pub fn incorporate_feedback_signature() -> Signature {
    Signature::new(
        "incorporate_feedback",
        "Revise the draft skill body according to the reviewer's feedback. \
         Keep everything the feedback does not touch. Summarize each change \
         you made.",
    )
    .input("body", "The current draft body")
    .input("feedback", "Reviewer feedback to incorporate")
    .output("body", "The revised Markdown body", FieldType::Text)
    .output("changes", "One entry per change made", FieldType::List)
}

/// Output of GenerateSkillContent.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DraftContent {
    pub name: String,
    pub description: String,
    pub body: String,
}

/// Output of IncorporateFeedback.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RevisedContent {
    pub body: String,
    pub changes: Vec<String>,
}

pub async fn generate_skill_content(
    module: &LmModule,
    client: &LmClient,
    summary: &str,
    outline: &[String],
    style: SkillStyle,
    taxonomy_path: &str,
    suggested_name: &str,
) -> Result<DraftContent> {
    let output = module
        .invoke(
            client,
            &[
                ("summary", summary),
                ("outline", &outline.join("\n")),
                ("style", style.as_str()),
                ("taxonomy_path", taxonomy_path),
                ("suggested_name", suggested_name),
            ],
        )
        .await?;
    Ok(DraftContent {
        name: output.require_str("name")?,
        description: output.require_str("description")?,
        body: output.require_str("body")?,
    })
}

pub async fn incorporate_feedback(
    module: &LmModule,
    client: &LmClient,
    body: &str,
    feedback: &str,
) -> Result<RevisedContent> {
    let output = module
        .invoke(client, &[("body", body), ("feedback", feedback)])
        .await?;
    Ok(RevisedContent {
        body: output.require_str("body")?,
        changes: output.require_list("changes")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::client::ScriptedReply;
    use serde_json::json;

    #[tokio::test]
    async fn generation_maps_fields() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "name": "git-aliases",
            "description": "A reference of useful Git aliases.",
            "body": "# Git Aliases\n\n`co = checkout`\n",
        }))]);
        let module = LmModule::new(generate_content_signature());
        let draft = generate_skill_content(
            &module,
            &client,
            "git aliases reference",
            &["Overview".into(), "Aliases".into()],
            SkillStyle::Minimal,
            "development/tools/git/aliases",
            "git-aliases",
        )
        .await
        .unwrap();
        assert_eq!(draft.name, "git-aliases");
        assert!(draft.body.contains("# Git Aliases"));
    }

    #[tokio::test]
    async fn feedback_revision_keeps_change_log() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "body": "# Revised\n",
            "changes": ["added examples section", "fixed alias typo"],
        }))]);
        let module = LmModule::new(incorporate_feedback_signature());
        let revised = incorporate_feedback(&module, &client, "# Draft\n", "add examples")
            .await
            .unwrap();
        assert_eq!(revised.changes.len(), 2);
        assert!(revised.body.starts_with("# Revised"));
    }

    #[tokio::test]
    async fn missing_body_is_permanent() {
        let client = LmClient::scripted([ScriptedReply::Value(json!({
            "name": "x",
            "description": "d",
        }))]);
        let module = LmModule::new(generate_content_signature());
        let err = generate_skill_content(
            &module,
            &client,
            "s",
            &[],
            SkillStyle::Comprehensive,
            "a/b",
            "x",
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "lm_permanent");
    }
}
