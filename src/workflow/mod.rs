//! The three-phase skill-creation workflow.
//!
//! Understanding → Generation → Validation, with HITL checkpoints, bounded
//! refinement, and signature tuning. The engine owns the per-job
//! cancellation tokens and is the only writer of job state (through the
//! store's serialized `update`).

mod engine;
mod phases;

pub use engine::{EngineConfig, WorkflowEngine};
