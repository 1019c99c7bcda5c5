//! Request/Response types for the HTTP server.
//!
//! These types define the wire format for all HTTP API endpoints.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorEnvelope, Result, SkillfabError};
use crate::jobs::model::{HitlPayload, Job, JobInputs};
use crate::metrics::weights::SkillStyle;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Server status (always "ok" when healthy)
    pub status: String,
    /// Server version from Cargo.toml
    pub version: String,
}

impl HealthResponse {
    /// Create a healthy response with the current package version
    pub fn healthy() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request body for creating a skill job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSkillRequest {
    /// The task description, 1-4096 chars
    pub task_description: String,

    /// Optional extra context, up to 8192 chars
    #[serde(default)]
    pub user_context: Option<String>,

    /// Optional user identifier
    #[serde(default)]
    pub user_id: Option<String>,

    /// Optional explicit authoring style tag
    #[serde(default)]
    pub style: Option<String>,
}

impl CreateSkillRequest {
    /// Convert into validated job inputs.
    pub fn into_inputs(self) -> Result<JobInputs> {
        let style = self
            .style
            .as_deref()
            .map(SkillStyle::parse)
            .transpose()?;
        let inputs = JobInputs {
            task_description: self.task_description,
            user_context: self.user_context,
            user_id: self.user_id,
            style,
        };
        inputs.validate()?;
        Ok(inputs)
    }
}

/// Response after accepting a skill job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateSkillResponse {
    pub job_id: String,
}

/// Job status view: the job record minus internal counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub phase: String,
    pub percent: f64,
    pub message: String,
    /// Whether a HITL prompt is outstanding
    pub awaiting_input: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    pub created_at: String,
    pub updated_at: String,
    pub expires_at: String,
}

impl JobStatusResponse {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.to_string(),
            status: job.status.as_str().to_string(),
            phase: job.progress.phase.clone(),
            percent: job.progress.percent,
            message: job.progress.message.clone(),
            awaiting_input: job.prompt.is_some(),
            final_score: job.state.final_score,
            artifact_path: job.state.artifact_path.clone(),
            error: job.error.clone(),
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            expires_at: job.expires_at.to_rfc3339(),
        }
    }
}

/// Peek response: `{type, payload, prompt_key}` when a prompt is
/// outstanding, an empty object otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptResponse {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub prompt_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<HitlPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_key: Option<String>,
}

/// Request body for submitting a HITL response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondRequest {
    pub prompt_key: String,
    /// One of `proceed`, `revise`, `cancel`; unknown words proceed
    pub action: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Acknowledgement for an accepted response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RespondResponse {
    pub ok: bool,
}

/// Map an error to its HTTP status code.
pub fn status_for(error: &SkillfabError) -> u16 {
    match error.kind() {
        "invalid_input" => 400,
        "not_found" => 404,
        "conflict" => 409,
        "persistence_error" => 503,
        _ => 500,
    }
}
