//! Status responses, including reconstruction of unregistered jobs.
//!
//! Job ids end in their creation time in unix milliseconds. When a status
//! query names an id the registry does not hold, the solar and ledger
//! families rebuild a plausible record from the elapsed time since then.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::files::listing::{encode, job_files};
use crate::job::{parse_timestamp_millis, FileDescriptor, JobMode, JobRecord, JobRegistry, JobStatus};

/// Route family a status query arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    Solar,
    WeeklyReport,
    Ledger,
}

impl StatusFamily {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "amos" => Some(StatusFamily::Solar),
            "wpr" => Some(StatusFamily::WeeklyReport),
            "jonas" => Some(StatusFamily::Ledger),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusFamily::Solar => "amos",
            StatusFamily::WeeklyReport => "wpr",
            StatusFamily::Ledger => "jonas",
        }
    }

    /// Percent per second assumed for reconstructed progress and estimates.
    pub fn rate(self) -> u64 {
        match self {
            StatusFamily::Ledger => 10,
            _ => 8,
        }
    }

    fn download_url(self, job_id: &str, record: &JobRecord) -> Option<String> {
        if record.status != JobStatus::Completed {
            return None;
        }
        match self {
            StatusFamily::Solar => Some(format!("/jobs/amos/download?jobId={}", encode(job_id))),
            StatusFamily::Ledger => Some(format!("/jobs/jonas/download?jobId={}", encode(job_id))),
            StatusFamily::WeeklyReport => record.files.first().map(|f| f.download_url.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds since the job started.
    pub elapsed: u64,
    pub estimated_remaining: u64,
}

/// Body of `GET /jobs/{family}/status`. Identical in real and demo mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub message: String,
    pub details: StatusDetails,
    pub download_url: Option<String>,
    pub files: Vec<FileDescriptor>,
    pub record_count: u64,
    pub total_files: usize,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn from_record(
        family: StatusFamily,
        job_id: &str,
        record: &JobRecord,
        now: DateTime<Utc>,
    ) -> Self {
        let elapsed = record
            .start_time
            .map(|start| now.signed_duration_since(start).num_seconds().max(0) as u64)
            .unwrap_or(0);
        let estimated_remaining = if record.progress < 100 && !record.is_terminal() {
            ((100 - record.progress as u64) / family.rate()).max(1)
        } else {
            0
        };

        Self {
            job_id: job_id.to_string(),
            status: record.status,
            progress: record.progress,
            message: record.message.clone(),
            details: StatusDetails {
                start_time: record.start_time,
                elapsed,
                estimated_remaining,
            },
            download_url: family.download_url(job_id, record),
            files: record.files.clone(),
            record_count: record.record_count,
            total_files: record.files.len(),
            error: record.error.clone(),
        }
    }
}

/// Progress after `elapsed_secs` at `rate` percent per second, capped at 100.
pub fn reconstructed_progress(elapsed_secs: u64, rate: u64) -> u8 {
    elapsed_secs.saturating_mul(rate).min(100) as u8
}

fn ladder_message(ladder: &[(u8, String)], progress: u8) -> String {
    ladder
        .iter()
        .rev()
        .find(|(floor, _)| progress >= *floor)
        .map(|(_, message)| message.clone())
        .unwrap_or_default()
}

fn solar_ladder(platform: &str) -> Vec<(u8, String)> {
    vec![
        (0, format!("Initializing {platform} automation...")),
        (10, format!("Starting {platform} connection...")),
        (25, format!("Logging in to {platform}...")),
        (40, "Configuring data extraction parameters...".to_string()),
        (60, "Downloading monitoring data...".to_string()),
        (80, "Processing data files...".to_string()),
        (95, "Finalizing data extraction...".to_string()),
        (100, format!("{platform} data extraction completed successfully!")),
    ]
}

fn ledger_ladder() -> Vec<(u8, String)> {
    [
        (0, "Initializing AM Automation connection..."),
        (10, "Logging in to AM Automation..."),
        (25, "Login successful, navigating to reports..."),
        (40, "Configuring report parameters..."),
        (60, "Querying data from AM Automation..."),
        (80, "Processing report data..."),
        (95, "Finalizing report..."),
        (100, "Report completed successfully!"),
    ]
    .into_iter()
    .map(|(floor, message)| (floor, message.to_string()))
    .collect()
}

/// Demo export set reported by a reconstructed solar job.
fn solar_demo_files(locus: bool, now: DateTime<Utc>) -> Vec<FileDescriptor> {
    let mut rng = rand::thread_rng();
    let stamp = now.timestamp_millis();
    let names: &[(&str, std::ops::Range<u64>)] = if locus {
        &[("locus_energy_data", 15_000..45_000)]
    } else {
        &[
            ("meter_data", 20_000..45_000),
            ("inverter_data", 12_000..30_000),
            ("weather_station_data", 8_000..18_000),
        ]
    };

    names
        .iter()
        .map(|(prefix, size)| {
            let file_name = format!("{prefix}_{stamp}.csv");
            FileDescriptor {
                download_url: format!(
                    "/jobs/amos/download?file={}&type=demo",
                    encode(&file_name)
                ),
                file_name,
                size: rng.gen_range(size.clone()),
                created: now,
            }
        })
        .collect()
}

/// Answers status queries from the registry, rebuilding unknown jobs where
/// the family allows it.
pub struct StatusService {
    registry: Arc<JobRegistry>,
    ledger_dir: PathBuf,
}

impl StatusService {
    pub fn new(registry: Arc<JobRegistry>, downloads: PathBuf) -> Self {
        Self {
            registry,
            ledger_dir: downloads.join("jonas"),
        }
    }

    /// `None` when the job is unknown and cannot be reconstructed.
    pub async fn status(&self, family: StatusFamily, job_id: &str) -> Option<StatusResponse> {
        let now = Utc::now();
        if let Some(record) = self.registry.get(job_id) {
            return Some(StatusResponse::from_record(family, job_id, &record, now));
        }

        let record = match family {
            StatusFamily::Solar => self.reconstruct_solar(job_id, now)?,
            StatusFamily::Ledger => self.reconstruct_ledger(job_id, now).await?,
            StatusFamily::WeeklyReport => return None,
        };
        Some(StatusResponse::from_record(family, job_id, &record, now))
    }

    /// Solar ids naming a platform advance at 8% per second. A completed
    /// reconstruction is kept in the registry so later queries agree.
    fn reconstruct_solar(&self, job_id: &str, now: DateTime<Utc>) -> Option<JobRecord> {
        let locus = job_id.contains("locus");
        if !locus && !job_id.contains("powertrack") {
            return None;
        }
        let (started, progress) = elapsed_progress(job_id, now, StatusFamily::Solar.rate())?;
        let platform = if locus { "Locus Energy" } else { "PowerTrack" };
        log::debug!("Reconstructing {} job {} at {}%", platform, job_id, progress);

        let mut record = JobRecord::starting(JobMode::Demo, "");
        record.start_time = Some(started);
        let message = ladder_message(&solar_ladder(platform), progress);
        if progress < 100 {
            record.advance(progress, &message);
            return Some(record);
        }

        let record_count = if locus { 2000 } else { 5000 };
        record.complete(&message, solar_demo_files(locus, now), record_count);
        if let Err(e) = self.registry.set(job_id, record.clone()) {
            log::warn!("Could not cache reconstructed job {}: {}", job_id, e);
        }
        Some(record)
    }

    /// Ledger ids advance at 10% per second; files come from the job-id scan.
    async fn reconstruct_ledger(&self, job_id: &str, now: DateTime<Utc>) -> Option<JobRecord> {
        let (started, progress) = elapsed_progress(job_id, now, StatusFamily::Ledger.rate())?;
        let files = match job_files(&self.ledger_dir, job_id).await {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Failed to list files for job {}: {}", job_id, e);
                Vec::new()
            }
        };

        let mut record = JobRecord::starting(JobMode::Demo, "");
        record.start_time = Some(started);
        let message = ladder_message(&ledger_ladder(), progress);
        if progress < 100 {
            record.advance(progress, &message);
            record.files = files;
        } else {
            let count = files.len() as u64;
            record.complete(&message, files, count);
        }
        Some(record)
    }
}

fn elapsed_progress(job_id: &str, now: DateTime<Utc>, rate: u64) -> Option<(DateTime<Utc>, u8)> {
    let millis = parse_timestamp_millis(job_id)?;
    let started = DateTime::<Utc>::from_timestamp_millis(millis)?;
    let elapsed = now.signed_duration_since(started).num_seconds().max(0) as u64;
    Some((started, reconstructed_progress(elapsed, rate)))
}
