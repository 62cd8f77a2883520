//! Spawning and supervising external automation processes.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::InvokeError;
use crate::telemetry::redact_args;

/// How long output readers may keep draining after a kill.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Everything needed to launch one external process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    /// Command line for logs, with credentials masked.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(redact_args(&self.args));
        parts.join(" ")
    }
}

/// Output and lifecycle events of a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    /// Always the last event; `None` when killed by a signal.
    Exited { code: Option<i32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

impl ExitReason {
    pub fn success(&self) -> bool {
        matches!(self, ExitReason::Exited(Some(0)))
    }
}

/// Result of a supervised run.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub reason: ExitReason,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.reason.success()
    }

    /// Failure text: stderr, else stdout, else `"Unknown error"`.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        let stdout = self.stdout.trim();
        if !stderr.is_empty() {
            stderr.to_string()
        } else if !stdout.is_empty() {
            stdout.to_string()
        } else {
            match self.reason {
                ExitReason::TimedOut => "Process timed out".to_string(),
                ExitReason::Cancelled => "Process cancelled".to_string(),
                ExitReason::Exited(_) => "Unknown error".to_string(),
            }
        }
    }
}

/// Launches processes and hands out per-job cancellation tokens.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl ProcessInvoker {
    pub fn new(timeout: Option<Duration>, shutdown: CancellationToken) -> Self {
        Self { timeout, shutdown }
    }

    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Self {
        Self::new(config.jobs.process_timeout(), shutdown)
    }

    /// Deadline applied to automation runs, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Token cancelled when the job or the whole service is stopped.
    pub fn job_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Spawns `spec`. A spawn failure is reported separately from a failed exit.
    pub fn spawn(&self, spec: &ProcessSpec) -> Result<RunningProcess, InvokeError> {
        spawn(spec)
    }
}

/// Spawns `spec` with piped output, as the leader of a new process group.
pub fn spawn(spec: &ProcessSpec) -> Result<RunningProcess, InvokeError> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }

    log::debug!("Spawning: {}", spec.display());

    let mut child = cmd.spawn().map_err(|e| InvokeError::Spawn {
        program: spec.program.display().to_string(),
        source: e,
    })?;

    let stdout = child.stdout.take().ok_or(InvokeError::MissingPipe)?;
    let stderr = child.stderr.take().ok_or(InvokeError::MissingPipe)?;
    let pid = child.id();

    let (tx, rx) = mpsc::unbounded_channel();
    let kill = CancellationToken::new();

    let stdout_task = tokio::spawn(forward_lines(stdout, tx.clone(), ProcessEvent::Stdout));
    let stderr_task = tokio::spawn(forward_lines(stderr, tx.clone(), ProcessEvent::Stderr));
    let readers = [stdout_task.abort_handle(), stderr_task.abort_handle()];

    let monitor_kill = kill.clone();
    tokio::spawn(async move {
        let code = wait_or_kill(child, pid, &monitor_kill).await;

        // Descendants may still hold the pipes after the leader is gone.
        let drained = async {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
        };
        let abandoned = async {
            monitor_kill.cancelled().await;
            kill_group(pid);
            tokio::time::sleep(KILL_GRACE).await;
        };
        tokio::select! {
            _ = drained => {}
            _ = abandoned => {
                log::warn!("Output of process {:?} still open after kill, abandoning it", pid);
                for reader in &readers {
                    reader.abort();
                }
            }
        }

        // Exited must follow every output event
        let _ = tx.send(ProcessEvent::Exited { code });
    });

    Ok(RunningProcess {
        pid,
        events: rx,
        kill,
    })
}

async fn forward_lines<R>(
    reader: R,
    tx: mpsc::UnboundedSender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let chunk = String::from_utf8_lossy(&buf).to_string();
                if tx.send(wrap(chunk)).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::warn!("Error reading process output: {}", e);
                break;
            }
        }
    }
}

async fn wait_or_kill(mut child: Child, pid: Option<u32>, kill: &CancellationToken) -> Option<i32> {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => status.code(),
            Err(e) => {
                log::error!("Failed to wait for process: {}", e);
                None
            }
        },
        _ = kill.cancelled() => {
            kill_group(pid);
            if let Err(e) = child.kill().await {
                log::debug!("Failed to kill process: {}", e);
            }
            None
        }
    }
}

/// SIGKILLs every process in the group led by `pid`.
#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("Failed to kill process group {}: {}", pid, e),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Handle to a spawned process and its event stream.
pub struct RunningProcess {
    pid: Option<u32>,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    kill: CancellationToken,
}

impl RunningProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Next output or exit event; `None` once `Exited` has been delivered.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Kills the process and its group. Output already produced is still
    /// delivered.
    pub fn kill(&mut self) {
        self.kill.cancel();
    }

    /// Drains events until exit, killing the process on deadline or cancel.
    pub async fn supervise<F>(
        mut self,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> ProcessOutcome
    where
        F: FnMut(&ProcessEvent),
    {
        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut killed: Option<ExitReason> = None;

        let deadline_at = deadline.map(|d| Instant::now() + d);
        let timer = async move {
            match deadline_at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let Some(event) = event else {
                        return ProcessOutcome {
                            reason: killed.unwrap_or(ExitReason::Exited(None)),
                            stdout,
                            stderr,
                        };
                    };
                    match &event {
                        ProcessEvent::Stdout(chunk) => stdout.push_str(chunk),
                        ProcessEvent::Stderr(chunk) => stderr.push_str(chunk),
                        ProcessEvent::Exited { .. } => {}
                    }
                    on_event(&event);
                    if let ProcessEvent::Exited { code } = event {
                        return ProcessOutcome {
                            reason: killed.unwrap_or(ExitReason::Exited(code)),
                            stdout,
                            stderr,
                        };
                    }
                }
                _ = cancel.cancelled(), if killed.is_none() => {
                    log::info!("Cancelling process {:?}", self.pid);
                    killed = Some(ExitReason::Cancelled);
                    self.kill();
                }
                _ = &mut timer, if killed.is_none() => {
                    log::warn!("Process {:?} exceeded its deadline, killing", self.pid);
                    killed = Some(ExitReason::TimedOut);
                    self.kill();
                }
            }
        }
    }
}

/// One-off run with a hard timeout. Returns `Ok(None)` if the process was
/// killed for exceeding it.
pub async fn run_with_timeout(
    spec: &ProcessSpec,
    timeout: Duration,
) -> Result<Option<ProcessOutcome>, InvokeError> {
    let process = spawn(spec)?;
    let outcome = process
        .supervise(Some(timeout), &CancellationToken::new(), |_| {})
        .await;
    if outcome.reason == ExitReason::TimedOut {
        return Ok(None);
    }
    Ok(Some(outcome))
}
