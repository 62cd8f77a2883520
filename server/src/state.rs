//! Shared handles for request handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use portaljobs::automation::{AutomationContext, JobRunner};
use portaljobs::broadcast::JobProgressBroadcaster;
use portaljobs::config::Config;
use portaljobs::files::FileResolver;
use portaljobs::job::JobRegistry;
use portaljobs::process::{Interpreter, ProcessInvoker, VendorLookup};
use portaljobs::status::StatusService;
use portaljobs::worker::WorkerPool;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub runner: Arc<JobRunner>,
    pub resolver: Arc<FileResolver>,
    pub status: Arc<StatusService>,
    pub lookup: Arc<VendorLookup>,
    pub broadcaster: JobProgressBroadcaster,
    /// Interval between snapshots on the event stream.
    pub poll_interval: Duration,
    /// Cancelled on shutdown; stops running jobs and the sweeper.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: &Config, shutdown: CancellationToken) -> Self {
        let registry = Arc::new(JobRegistry::from_config(&config.jobs));
        let interpreter = Arc::new(Interpreter::discover(config));
        let broadcaster = JobProgressBroadcaster::default();

        let runner = Arc::new(JobRunner::new(
            config,
            AutomationContext::new(config, Arc::clone(&interpreter)),
            Arc::clone(&registry),
            broadcaster.clone(),
            WorkerPool::from_config(&config.jobs),
            ProcessInvoker::from_config(config, shutdown.clone()),
        ));

        Self {
            resolver: Arc::new(FileResolver::new(config, Arc::clone(&registry))),
            status: Arc::new(StatusService::new(
                Arc::clone(&registry),
                config.paths.downloads(),
            )),
            lookup: Arc::new(VendorLookup::from_config(config, interpreter)),
            registry,
            runner,
            broadcaster,
            poll_interval: config.jobs.poll_interval(),
            shutdown,
        }
    }
}
