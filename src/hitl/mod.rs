//! Human-in-the-loop coordination.
//!
//! The coordinator mediates between a suspended workflow and an external
//! responder: it publishes prompts (suspending the job), serves idempotent
//! peeks, enforces at-most-once response delivery via the prompt key, and
//! wakes the workflow when a response (or cancellation) arrives.

pub mod keywords;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SkillfabError};
use crate::jobs::model::{HitlPayload, HitlPrompt, HitlResponse, JobId, JobStatus};
use crate::jobs::store::JobStore;

pub use keywords::ActionKeywords;

/// Fallback poll period while awaiting a response. The notify primitive
/// normally wakes the workflow first; the poll only bounds the window after
/// a missed wakeup.
const RESPONSE_POLL_PERIOD: Duration = Duration::from_millis(250);

/// Coordinates prompt publication and response intake.
pub struct HitlCoordinator {
    store: Arc<JobStore>,
    waiters: DashMap<JobId, Arc<Notify>>,
}

impl HitlCoordinator {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self {
            store,
            waiters: DashMap::new(),
        }
    }

    fn waiter(&self, job_id: JobId) -> Arc<Notify> {
        self.waiters
            .entry(job_id)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Publish a prompt: attach it to the job, transition to `pending_hitl`,
    /// persist. Returns the stored prompt (with its key).
    pub async fn publish_prompt(&self, job_id: JobId, payload: HitlPayload) -> Result<HitlPrompt> {
        let prompt = self
            .store
            .update(job_id, |job| job.publish_prompt(payload))
            .await?;
        tracing::info!(
            job_id = %job_id,
            prompt_key = %prompt.key,
            prompt_type = ?prompt.prompt_type(),
            "published HITL prompt"
        );
        Ok(prompt)
    }

    /// Idempotent peek: the outstanding prompt, or `None`.
    pub async fn peek_prompt(&self, job_id: JobId) -> Result<Option<HitlPrompt>> {
        Ok(self.store.get(job_id).await?.prompt)
    }

    /// Submit a response for a specific prompt key.
    ///
    /// Atomically verifies the job is in `pending_hitl` with a matching key;
    /// on match the response is recorded, the prompt cleared, the job moved
    /// back to `running`, and the suspended workflow woken. On mismatch the
    /// stale-response conflict is returned without mutation.
    pub async fn submit_response(
        &self,
        job_id: JobId,
        prompt_key: &str,
        response: HitlResponse,
    ) -> Result<()> {
        self.store
            .update(job_id, |job| job.accept_response(prompt_key, response))
            .await?;
        self.waiter(job_id).notify_one();
        tracing::info!(job_id = %job_id, prompt_key, "HITL response accepted");
        Ok(())
    }

    /// Wake any workflow awaiting on this job (used on cancellation).
    pub fn wake(&self, job_id: JobId) {
        if let Some(waiter) = self.waiters.get(&job_id) {
            waiter.notify_one();
        }
    }

    /// Suspend until a response arrives for `job_id`.
    ///
    /// Returns `Cancelled` if the job is cancelled (or the workflow token
    /// fires) while waiting. The job's TTL is the outer bound; there is no
    /// intrinsic timeout here.
    pub async fn await_response(
        &self,
        job_id: JobId,
        cancel: &CancellationToken,
    ) -> Result<HitlResponse> {
        let waiter = self.waiter(job_id);
        loop {
            if cancel.is_cancelled() {
                return Err(SkillfabError::Cancelled);
            }

            let job = self.store.get(job_id).await?;
            match job.status {
                JobStatus::Cancelled => return Err(SkillfabError::Cancelled),
                JobStatus::Failed => {
                    return Err(SkillfabError::Conflict(
                        "job failed while awaiting a response".into(),
                    ))
                }
                _ => {}
            }
            if job.response.is_some() {
                // Consume the response under the job lock.
                let taken = self
                    .store
                    .update(job_id, |job| Ok(job.response.take()))
                    .await?;
                if let Some(response) = taken {
                    return Ok(response);
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(SkillfabError::Cancelled),
                _ = waiter.notified() => {}
                _ = tokio::time::sleep(RESPONSE_POLL_PERIOD) => {}
            }
        }
    }

    /// Drop the waiter entry once a job reaches a terminal state.
    pub fn forget(&self, job_id: JobId) {
        self.waiters.remove(&job_id);
    }
}
