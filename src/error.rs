//! Error taxonomy for the skill pipeline.
//!
//! Every external operation surfaces one of these kinds; internal code may
//! use `anyhow` at the bootstrap boundary but converts before crossing into
//! the service facade.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All failure kinds the pipeline can surface.
#[derive(Debug, Error)]
pub enum SkillfabError {
    /// Request violates constraints (bad path, oversized string, bad enum).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Referenced job, skill, or prompt is absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// State-machine violation, including stale HITL prompt keys.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Upstream LM rate-limit or timeout; retried internally.
    #[error("transient LM failure: {0}")]
    LmTransient(String),

    /// Upstream LM refused or returned malformed output after retries.
    #[error("permanent LM failure: {0}")]
    LmPermanent(String),

    /// Produced artifact fails compliance/quality with the budget exhausted.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Durable store unavailable or unreadable.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A taxonomy path resolved outside the root.
    #[error("path escapes taxonomy root: {0}")]
    PathEscape(String),

    /// A skill artifact exists but cannot be parsed.
    #[error("malformed skill artifact: {0}")]
    MalformedArtifact(String),

    /// The job was cancelled.
    #[error("job cancelled")]
    Cancelled,
}

impl SkillfabError {
    /// Stable snake_case tag for the wire envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            SkillfabError::InvalidInput(_) => "invalid_input",
            SkillfabError::NotFound(_) => "not_found",
            SkillfabError::Conflict(_) => "conflict",
            SkillfabError::LmTransient(_) => "lm_transient",
            SkillfabError::LmPermanent(_) => "lm_permanent",
            SkillfabError::ValidationFailed(_) => "validation_failed",
            SkillfabError::Persistence(_) => "persistence_error",
            SkillfabError::PathEscape(_) => "path_escape",
            SkillfabError::MalformedArtifact(_) => "malformed_artifact",
            SkillfabError::Cancelled => "cancelled",
        }
    }

    /// The canonical conflict returned for a mismatched HITL prompt key.
    pub fn stale_response() -> Self {
        SkillfabError::Conflict("stale_response".to_string())
    }

    /// Whether this is the stale-response conflict.
    pub fn is_stale_response(&self) -> bool {
        matches!(self, SkillfabError::Conflict(msg) if msg == "stale_response")
    }

    /// Whether the error is worth retrying inside an operator.
    pub fn is_transient(&self) -> bool {
        matches!(self, SkillfabError::LmTransient(_))
    }

    /// Convert into the wire envelope.
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error_kind: self.kind().to_string(),
            message: self.to_string(),
            details: None,
        }
    }
}

impl From<std::io::Error> for SkillfabError {
    fn from(e: std::io::Error) -> Self {
        SkillfabError::Persistence(e.to_string())
    }
}

impl Serialize for SkillfabError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Wire-level error shape: `{error_kind, message, details?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// Snake_case tag from the taxonomy
    pub error_kind: String,
    /// Human-readable message
    pub message: String,
    /// Optional structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

pub type Result<T> = std::result::Result<T, SkillfabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(SkillfabError::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(SkillfabError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(SkillfabError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(SkillfabError::LmTransient("x".into()).kind(), "lm_transient");
        assert_eq!(SkillfabError::LmPermanent("x".into()).kind(), "lm_permanent");
        assert_eq!(
            SkillfabError::ValidationFailed("x".into()).kind(),
            "validation_failed"
        );
        assert_eq!(
            SkillfabError::Persistence("x".into()).kind(),
            "persistence_error"
        );
        assert_eq!(SkillfabError::PathEscape("x".into()).kind(), "path_escape");
        assert_eq!(
            SkillfabError::MalformedArtifact("x".into()).kind(),
            "malformed_artifact"
        );
        assert_eq!(SkillfabError::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn stale_response_is_conflict() {
        let err = SkillfabError::stale_response();
        assert_eq!(err.kind(), "conflict");
        assert!(err.is_stale_response());
        assert!(!SkillfabError::Conflict("other".into()).is_stale_response());
    }

    #[test]
    fn only_lm_transient_is_transient() {
        assert!(SkillfabError::LmTransient("429".into()).is_transient());
        assert!(!SkillfabError::LmPermanent("refused".into()).is_transient());
        assert!(!SkillfabError::Cancelled.is_transient());
    }

    #[test]
    fn io_errors_map_to_persistence() {
        let io = std::io::Error::other("disk gone");
        let err: SkillfabError = io.into();
        assert_eq!(err.kind(), "persistence_error");
    }

    #[test]
    fn envelope_serializes_without_empty_details() {
        let env = SkillfabError::NotFound("job 123".into()).to_envelope();
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"error_kind\":\"not_found\""));
        assert!(!json.contains("details"));
    }
}
