//! The durable job record and its state machine.
//!
//! A job captures one skill-creation request end to end: inputs, progress,
//! accumulated phase results, the outstanding HITL prompt (at most one), and
//! timestamps. Only the store mutates jobs; workflow code receives fields by
//! value and returns results that the engine applies through the store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorEnvelope, Result, SkillfabError};
use crate::lm::operators::generation::DraftContent;
use crate::lm::operators::understanding::{
    DependencyReport, IntentReport, PathProposal, RequirementsReport, SkillPlan,
};
use crate::lm::operators::validation::{ComplianceReport, QualityReport};
use crate::metrics::weights::SkillStyle;

/// Opaque 128-bit job identifier.
pub type JobId = Uuid;

/// Maximum task description length.
pub const MAX_TASK_DESCRIPTION_LEN: usize = 4096;

/// Maximum user context length.
pub const MAX_USER_CONTEXT_LEN: usize = 8192;

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    PendingHitl,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this state is a sink.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// The legal transition set.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, PendingHitl)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (PendingHitl, Running)
                | (PendingHitl, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::PendingHitl => "pending_hitl",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Validated inputs of one skill-creation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobInputs {
    pub task_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Explicit authoring style; detected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<SkillStyle>,
}

impl JobInputs {
    /// Enforce the request body constraints.
    pub fn validate(&self) -> Result<()> {
        let len = self.task_description.len();
        if len == 0 || len > MAX_TASK_DESCRIPTION_LEN {
            return Err(SkillfabError::InvalidInput(format!(
                "task_description length {} outside 1-{}",
                len, MAX_TASK_DESCRIPTION_LEN
            )));
        }
        if let Some(context) = &self.user_context {
            if context.len() > MAX_USER_CONTEXT_LEN {
                return Err(SkillfabError::InvalidInput(format!(
                    "user_context length {} exceeds {}",
                    context.len(),
                    MAX_USER_CONTEXT_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Human-facing progress snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Progress {
    /// Phase label, e.g. `understanding`
    pub phase: String,
    /// Completion fraction in [0,1]
    pub percent: f64,
    /// Human-readable message
    pub message: String,
}

impl Progress {
    pub fn at(phase: &str, percent: f64, message: impl Into<String>) -> Self {
        Self {
            phase: phase.to_string(),
            percent: percent.clamp(0.0, 1.0),
            message: message.into(),
        }
    }
}

/// Aggregated Phase 1 results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnderstandingSummary {
    pub requirements: RequirementsReport,
    pub intent: IntentReport,
    pub placement: PathProposal,
    pub dependencies: DependencyReport,
    pub plan: SkillPlan,
}

/// Phase 3 validation results with the composite verdict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationSummary {
    pub compliance: ComplianceReport,
    pub quality: QualityReport,
    pub style: SkillStyle,
    pub composite: f64,
    pub pass: bool,
}

/// Accumulated workflow state carried by the job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub understanding: Option<UnderstandingSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<DraftContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    /// User answers merged in after a clarify checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarifications: Option<String>,
    /// Preview revisions consumed (bounded)
    #[serde(default)]
    pub revision_count: u32,
    /// Refinement iterations consumed (bounded)
    #[serde(default)]
    pub refinement_count: u32,
    /// Signature-tuning iterations consumed (bounded)
    #[serde(default)]
    pub tuning_count: u32,
    /// Composite improvement achieved by the last accepted refinement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement: Option<f64>,
    /// Final composite score at completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_score: Option<f64>,
    /// Where the artifact landed, relative to the taxonomy root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
}

/// HITL prompt kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlPromptType {
    Clarify,
    Confirm,
    Preview,
    Validate,
}

/// Type-dependent prompt payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HitlPayload {
    /// Questions that block authoring
    Clarify { questions: Vec<String> },
    /// A summary awaiting confirmation
    Confirm { summary: String },
    /// The current draft for review
    Preview {
        name: String,
        description: String,
        body: String,
    },
    /// The failed validation report, budget exhausted
    Validate { report: ValidationSummary },
}

impl HitlPayload {
    pub fn prompt_type(&self) -> HitlPromptType {
        match self {
            HitlPayload::Clarify { .. } => HitlPromptType::Clarify,
            HitlPayload::Confirm { .. } => HitlPromptType::Confirm,
            HitlPayload::Preview { .. } => HitlPromptType::Preview,
            HitlPayload::Validate { .. } => HitlPromptType::Validate,
        }
    }
}

/// An outstanding prompt attached to a `pending_hitl` job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HitlPrompt {
    /// Unique key: `<job_id>:<seq>`, so clients can tell a new prompt from a
    /// re-fetch
    pub key: String,
    /// Monotonic per-job sequence number
    pub seq: u64,
    pub payload: HitlPayload,
    pub published_at: DateTime<Utc>,
}

impl HitlPrompt {
    pub fn new(job_id: JobId, seq: u64, payload: HitlPayload) -> Self {
        Self {
            key: format!("{}:{}", job_id, seq),
            seq,
            payload,
            published_at: Utc::now(),
        }
    }

    pub fn prompt_type(&self) -> HitlPromptType {
        self.payload.prompt_type()
    }
}

/// Canonical HITL actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlAction {
    Proceed,
    Revise,
    Cancel,
}

/// A recorded response to a HITL prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HitlResponse {
    pub action: HitlAction,
    /// Revision feedback or clarification answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// The durable record of one skill-creation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub inputs: JobInputs,
    pub progress: Progress,
    pub state: JobState,
    /// The outstanding prompt; present iff status is `pending_hitl`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<HitlPrompt>,
    /// Monotonic prompt sequence, never reused
    #[serde(default)]
    pub prompt_seq: u64,
    /// The last accepted response, consumed by the resuming workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<HitlResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    /// Liveness token of the process running this job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Job {
    /// Create a fresh pending job. `ttl_secs` bounds retrievability.
    pub fn new(inputs: JobInputs, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            inputs,
            progress: Progress::at("queued", 0.0, "job accepted"),
            state: JobState::default(),
            prompt: None,
            prompt_seq: 0,
            response: None,
            error: None,
            run_token: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ChronoDuration::seconds(ttl_secs.max(1)),
        }
    }

    /// Apply a status transition, enforcing the state machine.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SkillfabError::Conflict(format!(
                "illegal transition {} -> {}",
                self.status.as_str(),
                next.as_str()
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Attach a fresh prompt and move to `pending_hitl`.
    ///
    /// Exactly one prompt may be outstanding, so publishing over an existing
    /// one is a conflict.
    pub fn publish_prompt(&mut self, payload: HitlPayload) -> Result<HitlPrompt> {
        if self.prompt.is_some() {
            return Err(SkillfabError::Conflict(
                "job already has an outstanding prompt".into(),
            ));
        }
        self.transition(JobStatus::PendingHitl)?;
        self.prompt_seq += 1;
        let prompt = HitlPrompt::new(self.id, self.prompt_seq, payload);
        self.prompt = Some(prompt.clone());
        Ok(prompt)
    }

    /// Accept a response iff the job is pending on this exact prompt key.
    pub fn accept_response(&mut self, prompt_key: &str, response: HitlResponse) -> Result<()> {
        if self.status != JobStatus::PendingHitl {
            return Err(SkillfabError::stale_response());
        }
        match &self.prompt {
            Some(prompt) if prompt.key == prompt_key => {}
            _ => return Err(SkillfabError::stale_response()),
        }
        self.prompt = None;
        self.response = Some(response);
        self.transition(JobStatus::Running)
    }

    /// Mark the job failed with an error envelope.
    pub fn fail(&mut self, error: &SkillfabError) {
        // Failing is always possible from non-terminal states; progress
        // freezes at its last value.
        if !self.status.is_terminal() {
            self.status = JobStatus::Failed;
            self.error = Some(error.to_envelope());
            self.prompt = None;
            self.updated_at = Utc::now();
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> JobInputs {
        JobInputs {
            task_description: "Create a Git aliases reference".into(),
            user_context: None,
            user_id: Some("user-1".into()),
            style: Some(SkillStyle::Minimal),
        }
    }

    mod input_validation_tests {
        use super::*;

        #[test]
        fn accepts_normal_inputs() {
            assert!(inputs().validate().is_ok());
        }

        #[test]
        fn rejects_empty_task() {
            let mut bad = inputs();
            bad.task_description = String::new();
            assert_eq!(bad.validate().unwrap_err().kind(), "invalid_input");
        }

        #[test]
        fn rejects_oversized_task() {
            let mut bad = inputs();
            bad.task_description = "x".repeat(MAX_TASK_DESCRIPTION_LEN + 1);
            assert_eq!(bad.validate().unwrap_err().kind(), "invalid_input");
        }

        #[test]
        fn rejects_oversized_context() {
            let mut bad = inputs();
            bad.user_context = Some("x".repeat(MAX_USER_CONTEXT_LEN + 1));
            assert_eq!(bad.validate().unwrap_err().kind(), "invalid_input");
        }

        #[test]
        fn boundary_lengths_are_accepted() {
            let mut ok = inputs();
            ok.task_description = "x".repeat(MAX_TASK_DESCRIPTION_LEN);
            ok.user_context = Some("y".repeat(MAX_USER_CONTEXT_LEN));
            assert!(ok.validate().is_ok());
        }
    }

    mod state_machine_tests {
        use super::*;

        #[test]
        fn happy_path_transitions() {
            let mut job = Job::new(inputs(), 3600);
            assert_eq!(job.status, JobStatus::Pending);
            job.transition(JobStatus::Running).unwrap();
            job.transition(JobStatus::Completed).unwrap();
            assert!(job.is_terminal());
        }

        #[test]
        fn hitl_round_trip() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            job.transition(JobStatus::PendingHitl).unwrap();
            job.transition(JobStatus::Running).unwrap();
            job.transition(JobStatus::Failed).unwrap();
        }

        #[test]
        fn terminal_states_are_sinks() {
            for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
                for next in [
                    JobStatus::Pending,
                    JobStatus::Running,
                    JobStatus::PendingHitl,
                    JobStatus::Completed,
                    JobStatus::Failed,
                    JobStatus::Cancelled,
                ] {
                    assert!(!terminal.can_transition_to(next), "{:?} -> {:?}", terminal, next);
                }
            }
        }

        #[test]
        fn illegal_transition_is_conflict() {
            let mut job = Job::new(inputs(), 3600);
            let err = job.transition(JobStatus::Completed).unwrap_err();
            assert_eq!(err.kind(), "conflict");
            assert_eq!(job.status, JobStatus::Pending, "status unchanged on error");
        }

        #[test]
        fn pending_hitl_cannot_complete_directly() {
            assert!(!JobStatus::PendingHitl.can_transition_to(JobStatus::Completed));
        }

        #[test]
        fn expiry_is_after_creation() {
            let job = Job::new(inputs(), 3600);
            assert!(job.expires_at > job.created_at);
            let minimal = Job::new(inputs(), 0);
            assert!(minimal.expires_at > minimal.created_at);
        }
    }

    mod prompt_tests {
        use super::*;

        fn clarify() -> HitlPayload {
            HitlPayload::Clarify {
                questions: vec!["Which Python version?".into()],
            }
        }

        #[test]
        fn publish_attaches_prompt_and_suspends() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            let key = job.publish_prompt(clarify()).unwrap().key.clone();
            assert_eq!(job.status, JobStatus::PendingHitl);
            assert_eq!(key, format!("{}:1", job.id));
            assert_eq!(job.prompt.as_ref().unwrap().prompt_type(), HitlPromptType::Clarify);
        }

        #[test]
        fn at_most_one_outstanding_prompt() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            job.publish_prompt(clarify()).unwrap();
            let err = job.publish_prompt(clarify()).unwrap_err();
            assert_eq!(err.kind(), "conflict");
        }

        #[test]
        fn prompt_keys_are_monotonic() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            let first = job.publish_prompt(clarify()).unwrap().key.clone();
            job.accept_response(
                &first,
                HitlResponse {
                    action: HitlAction::Proceed,
                    feedback: None,
                },
            )
            .unwrap();
            let second = job.publish_prompt(clarify()).unwrap().key.clone();
            assert_ne!(first, second);
            assert!(second.ends_with(":2"));
        }

        #[test]
        fn response_with_matching_key_resumes() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            let key = job.publish_prompt(clarify()).unwrap().key.clone();
            job.accept_response(
                &key,
                HitlResponse {
                    action: HitlAction::Proceed,
                    feedback: Some("3.12".into()),
                },
            )
            .unwrap();
            assert_eq!(job.status, JobStatus::Running);
            assert!(job.prompt.is_none());
            assert_eq!(job.response.as_ref().unwrap().feedback.as_deref(), Some("3.12"));
        }

        #[test]
        fn stale_key_is_rejected_without_mutation() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            let key = job.publish_prompt(clarify()).unwrap().key.clone();
            let err = job
                .accept_response(
                    "bogus:9",
                    HitlResponse {
                        action: HitlAction::Proceed,
                        feedback: None,
                    },
                )
                .unwrap_err();
            assert!(err.is_stale_response());
            assert_eq!(job.status, JobStatus::PendingHitl);
            assert_eq!(job.prompt.as_ref().unwrap().key, key);
        }

        #[test]
        fn second_response_with_same_key_is_stale() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            let key = job.publish_prompt(clarify()).unwrap().key.clone();
            let response = HitlResponse {
                action: HitlAction::Proceed,
                feedback: None,
            };
            job.accept_response(&key, response.clone()).unwrap();
            let err = job.accept_response(&key, response).unwrap_err();
            assert!(err.is_stale_response());
            assert_eq!(job.status, JobStatus::Running, "no mutation on stale response");
        }

        #[test]
        fn response_to_cancelled_job_is_stale() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            let key = job.publish_prompt(clarify()).unwrap().key.clone();
            job.transition(JobStatus::Cancelled).unwrap();
            let err = job
                .accept_response(
                    &key,
                    HitlResponse {
                        action: HitlAction::Proceed,
                        feedback: None,
                    },
                )
                .unwrap_err();
            assert!(err.is_stale_response());
            assert_eq!(job.status, JobStatus::Cancelled);
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn job_round_trips_through_json() {
            let mut job = Job::new(inputs(), 3600);
            job.transition(JobStatus::Running).unwrap();
            job.publish_prompt(HitlPayload::Preview {
                name: "git-aliases".into(),
                description: "d".into(),
                body: "# b".into(),
            })
            .unwrap();

            let json = serde_json::to_string(&job).unwrap();
            let back: Job = serde_json::from_str(&json).unwrap();
            assert_eq!(back, job);
        }

        #[test]
        fn status_tags_are_snake_case() {
            assert_eq!(
                serde_json::to_string(&JobStatus::PendingHitl).unwrap(),
                "\"pending_hitl\""
            );
        }

        #[test]
        fn payload_is_internally_tagged() {
            let payload = HitlPayload::Clarify {
                questions: vec!["q".into()],
            };
            let json = serde_json::to_string(&payload).unwrap();
            assert!(json.contains("\"type\":\"clarify\""));
        }
    }

    #[test]
    fn fail_freezes_progress_and_clears_prompt() {
        let mut job = Job::new(inputs(), 3600);
        job.transition(JobStatus::Running).unwrap();
        job.progress = Progress::at("generation", 0.5, "drafting");
        job.publish_prompt(HitlPayload::Confirm { summary: "s".into() }).unwrap();

        job.fail(&SkillfabError::LmPermanent("refused".into()));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress.percent, 0.5);
        assert!(job.prompt.is_none());
        assert_eq!(job.error.as_ref().unwrap().error_kind, "lm_permanent");
    }

    #[test]
    fn fail_on_terminal_job_is_a_no_op() {
        let mut job = Job::new(inputs(), 3600);
        job.transition(JobStatus::Cancelled).unwrap();
        job.fail(&SkillfabError::LmPermanent("x".into()));
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.error.is_none());
    }
}
