//! In-memory job registry with TTL and capacity bounds.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::JobsConfig;
use crate::error::RegistryError;
use crate::job::record::JobRecord;

/// Shared store of job records, keyed by job id.
///
/// Terminal records are frozen: once a job is `completed` or `failed`,
/// further `set`/`update` calls leave it untouched. Terminal records expire
/// `ttl` after completion; live records are never evicted.
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobRecord>>,
    capacity: usize,
    ttl: Duration,
}

impl JobRegistry {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &JobsConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Inserts or replaces a record.
    ///
    /// Returns `Ok(false)` when the existing record is terminal and was kept.
    pub fn set(&self, id: &str, record: JobRecord) -> Result<bool, RegistryError> {
        let mut jobs = self.write();

        if let Some(existing) = jobs.get(id) {
            if existing.is_terminal() {
                return Ok(false);
            }
            jobs.insert(id.to_string(), record);
            return Ok(true);
        }

        if jobs.len() >= self.capacity {
            let expired = sweep_expired(&mut jobs, self.ttl, Utc::now());
            if expired > 0 {
                log::debug!("Evicted {} expired job records to make room", expired);
            }
        }
        if jobs.len() >= self.capacity && !evict_oldest_terminal(&mut jobs) {
            return Err(RegistryError::Full {
                capacity: self.capacity,
            });
        }

        jobs.insert(id.to_string(), record);
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.read().get(id).cloned()
    }

    pub fn exists(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Applies `f` to a live record. Progress never decreases.
    ///
    /// Returns `false` if the job is unknown or already terminal.
    pub fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut jobs = self.write();
        let Some(record) = jobs.get_mut(id) else {
            return false;
        };
        if record.is_terminal() {
            return false;
        }

        let previous = record.progress;
        f(record);
        record.progress = record.progress.max(previous).min(100);
        true
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops terminal records completed more than `ttl` before `now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut jobs = self.write();
        sweep_expired(&mut jobs, self.ttl, now)
    }
}

fn sweep_expired(
    jobs: &mut HashMap<String, JobRecord>,
    ttl: Duration,
    now: DateTime<Utc>,
) -> usize {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let before = jobs.len();
    jobs.retain(|_, record| match (record.is_terminal(), record.completed_at) {
        (true, Some(done)) => now.signed_duration_since(done) < ttl,
        _ => true,
    });
    before - jobs.len()
}

fn evict_oldest_terminal(jobs: &mut HashMap<String, JobRecord>) -> bool {
    let oldest = jobs
        .iter()
        .filter(|(_, record)| record.is_terminal())
        .min_by_key(|(_, record)| record.completed_at)
        .map(|(id, _)| id.clone());

    match oldest {
        Some(id) => {
            log::debug!("Evicting terminal job {} to make room", id);
            jobs.remove(&id);
            true
        }
        None => false,
    }
}
