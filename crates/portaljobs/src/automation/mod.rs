//! Automation families: what to run for a job and how to read its results.

pub mod ledger;
pub mod report;
pub mod runner;
pub mod solar;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AutomationError;
use crate::job::{FileDescriptor, JobId};
use crate::process::{Interpreter, ProcessOutcome, ProcessSpec};
use crate::progress::MarkerTable;

pub use ledger::{AccountRequest, LedgerAutomation, LedgerRequest};
pub use report::{ReportAutomation, ReportRequest};
pub use runner::{JobRunner, Submission};
pub use solar::{LocusAutomation, LocusRequest, PowerTrackAutomation, PowerTrackRequest};

/// Fixed texts and identity of one automation platform.
#[derive(Debug)]
pub struct PlatformInfo {
    /// Shown in logs.
    pub name: &'static str,
    pub job_prefix: &'static str,
    /// Route family serving the job: `amos`, `wpr` or `jonas`.
    pub family: &'static str,
    pub markers: MarkerTable,
    pub initializing: &'static str,
    pub starting: &'static str,
    pub submitted_real: &'static str,
    pub submitted_demo: &'static str,
    /// Messages at the first two demo steps.
    pub demo_steps: [&'static str; 2],
    pub demo_completed: &'static str,
    /// Prefix of the failure message, followed by `: <error>`.
    pub failure: &'static str,
}

/// Shared handles every automation needs.
#[derive(Debug, Clone)]
pub struct AutomationContext {
    pub interpreter: Arc<Interpreter>,
    pub root: PathBuf,
    pub scripts: PathBuf,
    pub downloads: PathBuf,
}

impl AutomationContext {
    pub fn new(config: &Config, interpreter: Arc<Interpreter>) -> Self {
        Self {
            interpreter,
            root: config.paths.root(),
            scripts: config.paths.scripts(),
            downloads: config.paths.downloads(),
        }
    }
}

/// A ready-to-spawn command plus files to remove once it exits.
#[derive(Debug)]
pub struct Prepared {
    pub spec: ProcessSpec,
    pub scratch: Vec<PathBuf>,
}

impl Prepared {
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            scratch: Vec::new(),
        }
    }
}

/// Output of a finished run.
#[derive(Debug, Clone)]
pub struct Collected {
    pub files: Vec<FileDescriptor>,
    pub record_count: u64,
    pub message: String,
}

#[async_trait]
pub trait Automation: Send + Sync {
    fn info(&self) -> &'static PlatformInfo;

    /// Whether the real automation can run here.
    async fn available(&self, ctx: &AutomationContext) -> bool;

    async fn prepare(
        &self,
        ctx: &AutomationContext,
        job_id: &JobId,
    ) -> Result<Prepared, AutomationError>;

    /// Gathers produced files after a successful exit.
    async fn collect(
        &self,
        ctx: &AutomationContext,
        job_id: &JobId,
        outcome: &ProcessOutcome,
    ) -> Result<Collected, AutomationError>;

    /// Writes the synthetic output of a demo run.
    async fn demo(
        &self,
        ctx: &AutomationContext,
        job_id: &JobId,
    ) -> Result<Collected, AutomationError>;
}

pub(crate) fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Trimmed value of a required text field.
pub(crate) fn required<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) async fn ensure_dir(dir: &Path) -> Result<(), AutomationError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| AutomationError::WriteFile {
            path: dir.to_path_buf(),
            source,
        })
}

pub(crate) async fn write_file(path: &Path, content: &[u8]) -> Result<(), AutomationError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|source| AutomationError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn describe(path: &Path, download_url: String) -> Result<FileDescriptor, AutomationError> {
    FileDescriptor::from_path(path, download_url).map_err(|source| AutomationError::ReadDir {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn script_exists(path: &Path) -> bool {
    let exists = path.is_file();
    if !exists {
        log::info!("Script {} not available", path.display());
    }
    exists
}
