use std::sync::Arc;

use log::{debug, info};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::JobsConfig;

/// Caps the number of external processes running at once.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

/// Held for the lifetime of one external process.
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
}

impl WorkerPool {
    /// # Panics
    /// Panics if `size` is 0.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool size must be > 0");
        info!("Worker pool allows {} concurrent processes", size);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn from_config(config: &JobsConfig) -> Self {
        Self::new(config.max_concurrent_processes.max(1))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Takes a permit without waiting.
    pub fn try_acquire(&self) -> Option<WorkerPermit> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| WorkerPermit { _permit: permit })
    }

    /// Waits for a free slot. Returns `None` if cancelled or the pool is shut down.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<WorkerPermit> {
        tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => Some(WorkerPermit { _permit: permit }),
                Err(_) => {
                    debug!("Worker pool closed while waiting for a permit");
                    None
                }
            },
            _ = cancel.cancelled() => None,
        }
    }

    /// Rejects all pending and future acquisitions.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.permits.close();
    }

    pub fn is_shutdown(&self) -> bool {
        self.permits.is_closed()
    }
}
