//! The durable job tier.
//!
//! The persistence contract is small: upsert by id, lookup by id,
//! enumeration by status, delete by id. Job ids are unique, so multi-writer
//! atomicity is not required. The default implementation keeps one JSON
//! document per job under the data directory, written atomically.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{Result, SkillfabError};
use crate::jobs::model::{Job, JobId, JobStatus};

/// Contract every durable tier implements.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert or replace the record for `job.id`.
    async fn upsert(&self, job: &Job) -> Result<()>;

    /// Fetch a job by id. Unreadable records read as absent.
    async fn get(&self, id: JobId) -> Result<Option<Job>>;

    /// All jobs currently in `status`.
    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    /// Remove a job by id. Removing an absent job is not an error.
    async fn delete(&self, id: JobId) -> Result<()>;
}

/// JSON-file durable tier: `<dir>/<job_id>.json` per job.
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    /// Open (creating if needed) a repository under `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl JobRepository for JsonFileRepository {
    async fn upsert(&self, job: &Job) -> Result<()> {
        let json = serde_json::to_string_pretty(job)
            .map_err(|e| SkillfabError::Persistence(format!("serialize job: {}", e)))?;
        let path = self.path_for(job.id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job>> {
        let path = self.path_for(id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                // A read failure is treated as not-found by contract.
                tracing::warn!(job_id = %id, "durable read failed: {}", e);
                return Ok(None);
            }
        };
        match serde_json::from_str(&contents) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                tracing::warn!(job_id = %id, "durable record unreadable: {}", e);
                Ok(None)
            }
        }
    }

    async fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(contents) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let Ok(job) = serde_json::from_str::<Job>(&contents) else {
                continue;
            };
            if job.status == status {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
