//! Test harness for isolated job execution.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use portaljobs::automation::{AutomationContext, JobRunner};
use portaljobs::broadcast::JobProgressBroadcaster;
use portaljobs::config::Config;
use portaljobs::files::FileResolver;
use portaljobs::job::{JobRecord, JobRegistry};
use portaljobs::process::{Interpreter, ProcessInvoker};
use portaljobs::status::StatusService;
use portaljobs::worker::WorkerPool;

pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
    pub registry: Arc<JobRegistry>,
}

impl TestHarness {
    /// A project root with `sh` as interpreter and a short demo schedule.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = Config::with_root(temp_dir.path());
        config.python.interpreter = Some("sh".to_string());
        config.demo.schedule_ms = vec![50, 100, 150];

        std::fs::create_dir_all(config.paths.scripts()).expect("Failed to create scripts dir");
        std::fs::create_dir_all(config.paths.downloads()).expect("Failed to create downloads dir");

        let registry = Arc::new(JobRegistry::new(100, Duration::from_secs(3600)));
        Self {
            temp_dir,
            config,
            registry,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn downloads(&self) -> PathBuf {
        self.config.paths.downloads()
    }

    /// Writes an automation script relative to the scripts directory.
    pub fn write_script(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.config.paths.scripts().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create script dir");
        }
        std::fs::write(&path, body).expect("Failed to write script");
        path
    }

    /// Writes a file relative to the downloads directory.
    pub fn write_download(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.downloads().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create download dir");
        }
        std::fs::write(&path, content).expect("Failed to write download");
        path
    }

    pub fn runner(&self) -> Arc<JobRunner> {
        let interpreter = Arc::new(Interpreter::discover(&self.config));
        Arc::new(JobRunner::new(
            &self.config,
            AutomationContext::new(&self.config, interpreter),
            Arc::clone(&self.registry),
            JobProgressBroadcaster::default(),
            WorkerPool::new(2),
            ProcessInvoker::new(Some(Duration::from_secs(10)), CancellationToken::new()),
        ))
    }

    pub fn resolver(&self) -> FileResolver {
        FileResolver::new(&self.config, Arc::clone(&self.registry))
    }

    pub fn status_service(&self) -> StatusService {
        StatusService::new(Arc::clone(&self.registry), self.downloads())
    }

    /// Polls the registry until the job is terminal or `timeout` passes.
    pub async fn wait_terminal(&self, job_id: &str, timeout: Duration) -> JobRecord {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let record = self.registry.get(job_id).expect("job registered");
            if record.is_terminal() {
                return record;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} still {} after {:?}",
                job_id,
                record.status,
                timeout
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
