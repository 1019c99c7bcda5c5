//! The two-tier job store.
//!
//! Reads hit the hot tier first and fall back to the durable tier,
//! repopulating memory on the way out. Writes go durable-first: if the
//! durable upsert fails the write is rejected and the job is unchanged.
//! Mutations serialize per job through `update`. A background sweeper drops
//! expired hot entries on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, SkillfabError};
use crate::jobs::durable::JobRepository;
use crate::jobs::memory::{MemoryTier, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::jobs::model::{Job, JobId, JobStatus};

/// Default sweep period (5 minutes). Must stay at or below TTL / 2.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Tuning knobs for the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub capacity: usize,
    pub ttl: Duration,
    pub sweep_period: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
            sweep_period: DEFAULT_SWEEP_PERIOD,
        }
    }
}

/// Two-tier job store: hot memory over a durable repository.
pub struct JobStore {
    memory: MemoryTier,
    durable: Arc<dyn JobRepository>,
    /// Per-job mutation locks
    locks: DashMap<JobId, Arc<Mutex<()>>>,
    /// Liveness token identifying this process instance
    run_token: String,
    /// Stops the background sweeper
    shutdown: CancellationToken,
    sweep_period: Duration,
}

impl JobStore {
    /// Build a store over a durable tier.
    pub fn new(durable: Arc<dyn JobRepository>, config: StoreConfig) -> Arc<Self> {
        Arc::new(Self {
            memory: MemoryTier::new(config.capacity, config.ttl),
            durable,
            locks: DashMap::new(),
            run_token: Uuid::new_v4().to_string(),
            shutdown: CancellationToken::new(),
            sweep_period: config.sweep_period,
        })
    }

    /// This process's liveness token, stamped onto running jobs.
    pub fn run_token(&self) -> &str {
        &self.run_token
    }

    fn lock_for(&self, id: JobId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Register a new job. Durable first; memory only on success.
    pub async fn create(&self, job: Job) -> Result<()> {
        self.durable.upsert(&job).await?;
        self.memory.insert(job);
        Ok(())
    }

    /// Fetch a job, falling back to the durable tier on a memory miss.
    pub async fn get(&self, id: JobId) -> Result<Job> {
        if let Some(job) = self.memory.get(id) {
            return Ok(job);
        }
        match self.durable.get(id).await? {
            Some(job) => {
                self.memory.insert(job.clone());
                Ok(job)
            }
            None => Err(SkillfabError::NotFound(format!("job {}", id))),
        }
    }

    /// Whether a job exists in either tier.
    pub async fn exists(&self, id: JobId) -> bool {
        if self.memory.contains(id) {
            return true;
        }
        matches!(self.durable.get(id).await, Ok(Some(_)))
    }

    /// Apply a mutation under the per-job lock, persisting durable-first.
    ///
    /// If the mutator or the durable upsert fails, the stored job is left
    /// unchanged.
    pub async fn update<R, F>(&self, id: JobId, mutator: F) -> Result<R>
    where
        F: FnOnce(&mut Job) -> Result<R>,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut job = self.get(id).await?;
        let result = mutator(&mut job)?;
        self.durable.upsert(&job).await?;
        self.memory.insert(job);
        Ok(result)
    }

    /// Snapshot of every hot job.
    pub fn snapshot(&self) -> Vec<Job> {
        self.memory.snapshot()
    }

    /// Hot-tier size (testing and diagnostics).
    pub fn hot_len(&self) -> usize {
        self.memory.len()
    }

    /// Mark `running` jobs from previous process instances as failed.
    ///
    /// Jobs suspended at a HITL checkpoint are left alone: they resume
    /// through the normal respond path. Returns the number orphaned.
    pub async fn recover_orphans(&self) -> Result<usize> {
        let running = self.durable.list_by_status(JobStatus::Running).await?;
        let mut orphaned = 0;
        for job in running {
            if job.run_token.as_deref() == Some(self.run_token.as_str()) {
                continue;
            }
            let outcome = self
                .update(job.id, |job| {
                    if job.status == JobStatus::Running {
                        job.fail(&SkillfabError::Persistence("orphaned".into()));
                    }
                    Ok(())
                })
                .await;
            match outcome {
                Ok(()) => {
                    orphaned += 1;
                    tracing::warn!(job_id = %job.id, "orphaned running job from previous run");
                }
                Err(e) => tracing::warn!(job_id = %job.id, "orphan recovery failed: {}", e),
            }
        }
        Ok(orphaned)
    }

    /// Start the background sweeper. Expired hot entries are dropped every
    /// period; durable copies are untouched.
    pub fn start_sweeper(self: &Arc<Self>) {
        let store = Arc::clone(self);
        let period = self.sweep_period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a fresh store
            // does not sweep at startup.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = store.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let dropped = store.memory.purge_expired();
                        if dropped > 0 {
                            tracing::debug!(dropped, "swept expired jobs from memory tier");
                        }
                    }
                }
            }
        });
    }

    /// Flush hot mutations and stop the sweeper.
    ///
    /// Writes are durable-first, so the flush is a safety net for records
    /// whose memory copy might be newer than disk.
    pub async fn shutdown(&self) {
        for job in self.memory.snapshot() {
            if let Err(e) = self.durable.upsert(&job).await {
                tracing::warn!(job_id = %job.id, "flush on shutdown failed: {}", e);
            }
        }
        self.shutdown.cancel();
    }
}
