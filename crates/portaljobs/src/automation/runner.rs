//! Submits automation jobs and drives them to a terminal state.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::automation::{Automation, AutomationContext, PlatformInfo, Prepared};
use crate::broadcast::{JobProgressBroadcaster, JobProgressTracker};
use crate::config::Config;
use crate::error::AutomationError;
use crate::job::{JobId, JobMode, JobRecord, JobRegistry};
use crate::process::{ProcessEvent, ProcessInvoker};
use crate::progress::ProgressDecoder;
use crate::worker::WorkerPool;

/// Progress a real run starts from once its process is launched.
const STARTED_PROGRESS: u8 = 10;
const DEMO_PROGRESS: [u8; 2] = [30, 60];
const WAITING_FOR_WORKER: &str = "Waiting for a free worker...";

/// Response to a job submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub job_id: String,
    pub mode: JobMode,
    pub message: String,
}

pub struct JobRunner {
    ctx: AutomationContext,
    registry: Arc<JobRegistry>,
    broadcaster: JobProgressBroadcaster,
    pool: WorkerPool,
    invoker: ProcessInvoker,
    schedule: [Duration; 3],
    force_demo: bool,
}

impl JobRunner {
    pub fn new(
        config: &Config,
        ctx: AutomationContext,
        registry: Arc<JobRegistry>,
        broadcaster: JobProgressBroadcaster,
        pool: WorkerPool,
        invoker: ProcessInvoker,
    ) -> Self {
        let defaults = [2000, 5000, 8000];
        let schedule = std::array::from_fn(|i| {
            Duration::from_millis(config.demo.schedule_ms.get(i).copied().unwrap_or(defaults[i]))
        });
        Self {
            ctx,
            registry,
            broadcaster,
            pool,
            invoker,
            schedule,
            force_demo: config.demo.force,
        }
    }

    pub fn context(&self) -> &AutomationContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &JobProgressBroadcaster {
        &self.broadcaster
    }

    /// Registers a job and starts it in the background.
    ///
    /// The run is real when the interpreter can be launched and the
    /// automation is available, else demo.
    pub async fn submit(
        self: &Arc<Self>,
        automation: Arc<dyn Automation>,
    ) -> Result<Submission, AutomationError> {
        let info = automation.info();
        let mode = if self.force_demo
            || !self.ctx.interpreter.is_spawnable()
            || !automation.available(&self.ctx).await
        {
            JobMode::Demo
        } else {
            JobMode::Real
        };

        let job_id = JobId::new(info.job_prefix);
        self.registry
            .set(job_id.as_str(), JobRecord::starting(mode, info.initializing))?;
        log::info!("Submitted {} job {} ({})", info.name, job_id, mode.as_str());

        let span = info_span!("job", job_id = %job_id, platform = info.name, mode = mode.as_str());
        let runner = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(
            async move {
                match mode {
                    JobMode::Real => runner.run_real(automation, id).await,
                    JobMode::Demo => runner.run_demo(automation, id).await,
                }
            }
            .instrument(span),
        );

        Ok(Submission {
            job_id: job_id.to_string(),
            mode,
            message: match mode {
                JobMode::Real => info.submitted_real,
                JobMode::Demo => info.submitted_demo,
            }
            .to_string(),
        })
    }

    async fn run_real(&self, automation: Arc<dyn Automation>, job_id: JobId) {
        let info = automation.info();
        let tracker = self.broadcaster.track(job_id.as_str(), Arc::clone(&self.registry));
        let cancel = self.invoker.job_token();

        let _permit = match self.pool.try_acquire() {
            Some(permit) => permit,
            None => {
                tracker.waiting(WAITING_FOR_WORKER);
                match self.pool.acquire(&cancel).await {
                    Some(permit) => permit,
                    None => {
                        fail(&tracker, info, "Worker pool is shut down");
                        return;
                    }
                }
            }
        };

        tracker.advance(STARTED_PROGRESS, info.starting);

        let prepared = match automation.prepare(&self.ctx, &job_id).await {
            Ok(prepared) => prepared,
            Err(e) => {
                log::error!("Failed to prepare job {}: {}", job_id, e);
                fail(&tracker, info, &e.to_string());
                return;
            }
        };

        log::info!("Running {}", prepared.spec.display());
        let process = match self.invoker.spawn(&prepared.spec) {
            Ok(process) => process,
            Err(e) => {
                log::warn!("{}; falling back to demo mode", e);
                remove_scratch(&prepared).await;
                tracker.update(|record| record.mode = JobMode::Demo);
                self.run_demo(automation, job_id).await;
                return;
            }
        };

        let mut decoder = ProgressDecoder::new(info.markers, STARTED_PROGRESS, info.starting);
        let outcome = process
            .supervise(self.invoker.timeout(), &cancel, |event| match event {
                ProcessEvent::Stdout(chunk) => {
                    debug!(job_id = %job_id, "stdout: {}", chunk.trim_end());
                    let before = (decoder.progress(), decoder.state());
                    let decoded = decoder.feed(chunk);
                    if (decoded.progress, decoded.event) != before {
                        tracker.advance(decoded.progress, &decoded.message);
                    }
                }
                ProcessEvent::Stderr(chunk) => {
                    debug!(job_id = %job_id, "stderr: {}", chunk.trim_end());
                }
                ProcessEvent::Exited { code } => {
                    log::info!("Job {} process exited with code {:?}", job_id, code);
                }
            })
            .await;

        remove_scratch(&prepared).await;

        if !outcome.success() {
            let error = outcome.error_text();
            log::error!("Job {} failed: {}", job_id, error);
            fail(&tracker, info, &error);
            return;
        }

        match automation.collect(&self.ctx, &job_id, &outcome).await {
            Ok(collected) => {
                log::info!("Job {} completed with {} file(s)", job_id, collected.files.len());
                tracker.completed(&collected.message, collected.files, collected.record_count);
            }
            Err(e) => {
                log::error!("Failed to collect output of job {}: {}", job_id, e);
                fail(&tracker, info, &e.to_string());
            }
        }
    }

    /// Fixed timer sequence: two progress steps, then synthetic output.
    async fn run_demo(&self, automation: Arc<dyn Automation>, job_id: JobId) {
        let info = automation.info();
        let tracker = self.broadcaster.track(job_id.as_str(), Arc::clone(&self.registry));
        let started = Instant::now();

        for (step, message) in info.demo_steps.iter().enumerate() {
            tokio::time::sleep_until(started + self.schedule[step]).await;
            tracker.advance(DEMO_PROGRESS[step], message);
        }
        tokio::time::sleep_until(started + self.schedule[2]).await;

        match automation.demo(&self.ctx, &job_id).await {
            Ok(collected) => {
                log::info!("Demo job {} completed", job_id);
                tracker.completed(&collected.message, collected.files, collected.record_count);
            }
            Err(e) => {
                log::error!("Demo job {} failed: {}", job_id, e);
                fail(&tracker, info, &e.to_string());
            }
        }
    }
}

fn fail(tracker: &JobProgressTracker, info: &PlatformInfo, error: &str) {
    tracker.failed(&format!("{}: {}", info.failure, error), error);
}

async fn remove_scratch(prepared: &Prepared) {
    for path in &prepared.scratch {
        if let Err(e) = tokio::fs::remove_file(path).await {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{ReportAutomation, ReportRequest};
    use crate::job::JobStatus;
    use crate::process::Interpreter;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn runner(dir: &TempDir, schedule: Vec<u64>) -> Arc<JobRunner> {
        runner_with(dir, schedule, "python3")
    }

    fn runner_with(dir: &TempDir, schedule: Vec<u64>, program: &str) -> Arc<JobRunner> {
        let mut config = Config::with_root(dir.path());
        config.demo.schedule_ms = schedule;
        let interpreter = Arc::new(Interpreter::new(program, dir.path()));
        Arc::new(JobRunner::new(
            &config,
            AutomationContext::new(&config, interpreter),
            Arc::new(JobRegistry::new(10, Duration::from_secs(60))),
            JobProgressBroadcaster::default(),
            WorkerPool::new(1),
            ProcessInvoker::new(None, CancellationToken::new()),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_schedule() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, vec![2000, 5000, 8000]);
        let submission = runner
            .submit(Arc::new(ReportAutomation::new(ReportRequest::default())))
            .await
            .unwrap();
        assert_eq!(submission.mode, JobMode::Demo);
        assert_eq!(submission.message, "Demo mode: Simulating WPR generation");
        assert!(submission.job_id.starts_with("wpr_job_"));

        let record = runner.registry().get(&submission.job_id).unwrap();
        assert_eq!(record.status, JobStatus::Starting);
        assert_eq!(record.message, "Initializing WPR generation...");

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let record = runner.registry().get(&submission.job_id).unwrap();
        assert_eq!((record.status, record.progress), (JobStatus::Processing, 30));

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(runner.registry().get(&submission.job_id).unwrap().progress, 60);
    }

    #[tokio::test]
    async fn test_demo_completes_with_one_file() {
        let dir = TempDir::new().unwrap();
        let runner = runner(&dir, vec![0, 0, 0]);
        let mut events = runner.broadcaster().subscribe();
        let submission = runner
            .submit(Arc::new(ReportAutomation::new(ReportRequest::default())))
            .await
            .unwrap();

        loop {
            let event = events.recv().await.unwrap();
            if event.status.is_terminal() {
                assert_eq!(event.status, JobStatus::Completed);
                break;
            }
        }
        let record = runner.registry().get(&submission.job_id).unwrap();
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.progress, 100);
        assert_eq!(record.message, "Demo: WPR generated successfully");
    }

    #[tokio::test]
    async fn test_missing_interpreter_submits_as_demo() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("automation_scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        std::fs::write(scripts.join("wpr_generator.py"), "print('hi')\n").unwrap();

        let runner = runner_with(&dir, vec![0, 0, 0], "/nonexistent/python-xyz");
        let mut events = runner.broadcaster().subscribe();
        let submission = runner
            .submit(Arc::new(ReportAutomation::new(ReportRequest::default())))
            .await
            .unwrap();
        assert_eq!(submission.mode, JobMode::Demo);
        assert_eq!(submission.message, "Demo mode: Simulating WPR generation");

        while !events.recv().await.unwrap().status.is_terminal() {}
        let record = runner.registry().get(&submission.job_id).unwrap();
        assert_eq!(record.mode, JobMode::Demo);
        assert_eq!(record.status, JobStatus::Completed);
    }
}
