//! The hot in-memory job tier.
//!
//! Bounded by capacity with least-recently-accessed eviction and per-entry
//! TTL. Accessors refresh the access time; iteration yields a snapshot.
//! Expired entries are swept by the store's background task — eviction and
//! expiry only ever drop the hot copy, never the durable one.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::jobs::model::{Job, JobId};

/// Default memory-tier capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default per-entry TTL (60 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

struct MemoryEntry {
    job: Job,
    inserted_at: Instant,
    last_access: Instant,
}

/// Capacity- and TTL-bounded hot tier.
pub struct MemoryTier {
    entries: DashMap<JobId, MemoryEntry>,
    capacity: usize,
    ttl: Duration,
}

impl MemoryTier {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Fetch a job, refreshing its access time.
    pub fn get(&self, id: JobId) -> Option<Job> {
        let mut entry = self.entries.get_mut(&id)?;
        entry.last_access = Instant::now();
        Some(entry.job.clone())
    }

    /// Whether a job is hot, refreshing its access time.
    pub fn contains(&self, id: JobId) -> bool {
        match self.entries.get_mut(&id) {
            Some(mut entry) => {
                entry.last_access = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Insert or replace a job, evicting least-recently-accessed entries
    /// until the tier is back under capacity.
    ///
    /// The observable size never exceeds capacity + 1: the new entry lands,
    /// then eviction immediately restores the bound.
    pub fn insert(&self, job: Job) {
        let now = Instant::now();
        let id = job.id;
        match self.entries.get_mut(&id) {
            Some(mut entry) => {
                entry.job = job;
                entry.last_access = now;
                return;
            }
            None => {
                self.entries.insert(
                    id,
                    MemoryEntry {
                        job,
                        inserted_at: now,
                        last_access: now,
                    },
                );
            }
        }

        while self.entries.len() > self.capacity {
            let coldest = self
                .entries
                .iter()
                .filter(|e| *e.key() != id)
                .min_by_key(|e| e.value().last_access)
                .map(|e| *e.key());
            match coldest {
                Some(victim) => {
                    self.entries.remove(&victim);
                    tracing::debug!(job_id = %victim, "evicted from memory tier");
                }
                None => break,
            }
        }
    }

    /// Drop a job from the hot tier (the durable copy is untouched).
    pub fn remove(&self, id: JobId) {
        self.entries.remove(&id);
    }

    /// Remove expired entries; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<JobId> = self
            .entries
            .iter()
            .filter(|e| now.duration_since(e.value().inserted_at) >= self.ttl)
            .map(|e| *e.key())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired.len()
    }

    /// Snapshot of every hot job.
    pub fn snapshot(&self) -> Vec<Job> {
        self.entries.iter().map(|e| e.value().job.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Backdate an entry so tests can observe expiry and eviction order.
    #[cfg(test)]
    pub(crate) fn backdate(&self, id: JobId, age: Duration) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.inserted_at = Instant::now() - age;
            entry.last_access = Instant::now() - age;
        }
    }
}
