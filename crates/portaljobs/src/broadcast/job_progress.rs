//! Job progress broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{FileDescriptor, JobRecord, JobRegistry, JobStatus};

/// Progress event for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    /// Unique job identifier.
    pub job_id: String,
    /// Overall job status.
    pub status: JobStatus,
    /// Percentage, 0-100.
    pub progress: u8,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
}

impl JobProgressEvent {
    pub fn from_record(job_id: &str, record: &JobRecord) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: record.status,
            progress: record.progress,
            message: record.message.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts job progress events for streaming.
#[derive(Clone)]
pub struct JobProgressBroadcaster {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressBroadcaster {
    /// Creates a new job progress broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: JobProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker that mirrors every registry mutation of `job_id`.
    pub fn track(&self, job_id: &str, registry: Arc<JobRegistry>) -> JobProgressTracker {
        JobProgressTracker {
            job_id: job_id.to_string(),
            registry,
            sender: Arc::clone(&self.sender),
        }
    }
}

impl Default for JobProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Updates one job in the registry and publishes the resulting snapshot.
#[derive(Clone)]
pub struct JobProgressTracker {
    job_id: String,
    registry: Arc<JobRegistry>,
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl JobProgressTracker {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Applies `f` and broadcasts. Returns `false` if the job was terminal or gone.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        if !self.registry.update(&self.job_id, f) {
            return false;
        }
        if let Some(record) = self.registry.get(&self.job_id) {
            let _ = self
                .sender
                .send(JobProgressEvent::from_record(&self.job_id, &record));
        }
        true
    }

    /// Sets the message while the job is still `starting`.
    pub fn waiting(&self, message: &str) -> bool {
        self.update(|record| record.message = message.to_string())
    }

    pub fn advance(&self, progress: u8, message: &str) -> bool {
        self.update(|record| record.advance(progress, message))
    }

    pub fn completed(&self, message: &str, files: Vec<FileDescriptor>, record_count: u64) -> bool {
        self.update(|record| record.complete(message, files, record_count))
    }

    pub fn failed(&self, message: &str, error: &str) -> bool {
        self.update(|record| record.fail(message, error))
    }
}
