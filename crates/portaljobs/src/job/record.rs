//! Job identity and status records.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job identifier of the form `{prefix}_{unixMillis}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Creates a fresh id stamped with the current time.
    pub fn new(prefix: &str) -> Self {
        Self::at(prefix, Utc::now())
    }

    pub fn at(prefix: &str, time: DateTime<Utc>) -> Self {
        Self(format!("{}_{}", prefix, time.timestamp_millis()))
    }

    /// Parses the trailing `_`-separated token as unix milliseconds.
    pub fn timestamp_millis(&self) -> Option<i64> {
        parse_timestamp_millis(&self.0)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn parse_timestamp_millis(id: &str) -> Option<i64> {
    let (_, tail) = id.rsplit_once('_')?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

/// Status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Starting,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a job drives the external automation or the timer fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Real,
    Demo,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Real => "real",
            JobMode::Demo => "demo",
        }
    }
}

/// A produced file, as reported in status responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_name: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub download_url: String,
}

impl FileDescriptor {
    /// Stats `path` and builds a descriptor. `created` falls back to mtime.
    pub fn from_path(path: &Path, download_url: String) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let created = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(Self {
            file_name,
            size: metadata.len(),
            created,
            download_url,
        })
    }
}

/// Mutable status of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
    #[serde(default)]
    pub record_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub mode: JobMode,
}

impl JobRecord {
    /// A freshly submitted job: `starting`, 0%.
    pub fn starting(mode: JobMode, message: &str) -> Self {
        Self {
            status: JobStatus::Starting,
            progress: 0,
            message: message.to_string(),
            start_time: Some(Utc::now()),
            completed_at: None,
            files: Vec::new(),
            record_count: 0,
            error: None,
            mode,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves to `processing`, raising progress to at least `progress`.
    pub fn advance(&mut self, progress: u8, message: &str) {
        self.status = JobStatus::Processing;
        self.progress = self.progress.max(progress.min(100));
        self.message = message.to_string();
    }

    pub fn complete(&mut self, message: &str, files: Vec<FileDescriptor>, record_count: u64) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.message = message.to_string();
        self.completed_at = Some(Utc::now());
        self.files = files;
        self.record_count = record_count;
        self.error = None;
    }

    /// Marks the job failed. Progress is kept where it was.
    pub fn fail(&mut self, message: &str, error: &str) {
        self.status = JobStatus::Failed;
        self.message = message.to_string();
        self.completed_at = Some(Utc::now());
        self.error = Some(error.to_string());
    }
}
