//! Skillfab: an LM-driven skill-authoring pipeline.
//!
//! A free-form task description goes in; a validated SKILL.md artifact in a
//! hierarchical taxonomy comes out. The pipeline runs as asynchronous jobs
//! that survive restarts, suspend at human-in-the-loop checkpoints, and
//! refine low-scoring drafts through bounded refinement and signature
//! tuning.

pub mod cache;
pub mod error;
pub mod hitl;
pub mod jobs;
pub mod lm;
pub mod metrics;
pub mod service;
pub mod sessions;
pub mod settings;
pub mod taxonomy;
pub mod workflow;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{ErrorEnvelope, SkillfabError};
pub use service::SkillService;
