//! Directory scans for produced files.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

use crate::files::sanitize::sanitize_job_id;
use crate::files::synthetic::report_week_start;
use crate::job::FileDescriptor;

/// Files in `dir` whose name satisfies `keep`, newest modification first.
///
/// A missing directory yields an empty list.
pub async fn scan_dir<F>(dir: &Path, mut keep: F) -> std::io::Result<Vec<(PathBuf, Metadata)>>
where
    F: FnMut(&str) -> bool,
{
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !keep(&name) {
            continue;
        }
        match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => found.push((entry.path(), metadata)),
            Ok(_) => {}
            Err(e) => log::debug!("Skipping {}: {}", name, e),
        }
    }

    found.sort_by_key(|(_, metadata)| {
        std::cmp::Reverse(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH))
    });
    Ok(found)
}

/// Newest file in `dir` whose name contains the sanitized `job_id`.
pub async fn find_by_job_id(dir: &Path, job_id: &str) -> std::io::Result<Option<PathBuf>> {
    let needle = sanitize_job_id(job_id);
    let mut found = scan_dir(dir, |name| name.contains(&needle)).await?;
    Ok(if found.is_empty() {
        None
    } else {
        Some(found.swap_remove(0).0)
    })
}

/// Descriptors for every file belonging to `job_id`, newest first.
pub async fn job_files(dir: &Path, job_id: &str) -> std::io::Result<Vec<FileDescriptor>> {
    let needle = sanitize_job_id(job_id);
    let found = scan_dir(dir, |name| name.contains(&needle)).await?;
    let mut files = Vec::with_capacity(found.len());
    for (path, _) in found {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        files.push(FileDescriptor::from_path(&path, ledger_download_url(job_id, &name))?);
    }
    Ok(files)
}

pub fn ledger_download_url(job_id: &str, file_name: &str) -> String {
    format!(
        "/jobs/jonas/download?jobId={}&fileName={}",
        encode(job_id),
        encode(file_name)
    )
}

pub fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// A generated weekly report as listed by `GET /jobs/wpr/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    pub filename: String,
    pub week: String,
    pub generated: DateTime<Utc>,
    pub size: String,
    pub projects: u32,
    pub download_url: String,
}

/// Weekly reports in `dir`, newest first.
pub async fn list_reports(dir: &Path) -> std::io::Result<Vec<ReportSummary>> {
    let found = scan_dir(dir, |name| {
        let lower = name.to_lowercase();
        lower.ends_with(".csv") && lower.contains("wpr")
    })
    .await?;

    Ok(found
        .into_iter()
        .map(|(path, metadata)| {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let generated = metadata
                .created()
                .or_else(|_| metadata.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            ReportSummary {
                id: filename
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect(),
                week: week_label(&filename, generated),
                generated,
                size: format_size(metadata.len()),
                projects: 3,
                download_url: format!("/jobs/wpr/download?fileName={}", encode(&filename)),
                filename,
            }
        })
        .collect())
}

/// `Jan 6-Jan 12, 2025` for the week a report covers.
pub fn week_label(file_name: &str, generated: DateTime<Utc>) -> String {
    let start = report_week_start(file_name, generated.date_naive());
    let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
    format!(
        "{}-{}, {}",
        start.format("%b %-d"),
        end.format("%b %-d"),
        end.format("%Y")
    )
}

/// Human-readable size with one decimal: `B`, `KB`, `MB`, `GB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = (size * 10.0).round() / 10.0;
    format!("{} {}", rounded, UNITS[unit])
}
