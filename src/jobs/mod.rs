//! Job records, persistence tiers, and the two-tier store.

pub mod durable;
pub mod memory;
pub mod model;
pub mod store;

pub use durable::{JobRepository, JsonFileRepository};
pub use memory::MemoryTier;
pub use model::{
    HitlAction, HitlPayload, HitlPrompt, HitlPromptType, HitlResponse, Job, JobId, JobInputs,
    JobState, JobStatus, Progress, UnderstandingSummary, ValidationSummary,
};
pub use store::{JobStore, StoreConfig};
