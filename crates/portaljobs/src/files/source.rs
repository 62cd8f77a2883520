//! Where downloadable bytes come from: disk, or a generator.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ResolveError;
use crate::files::content_type::content_type_for;
use crate::files::synthetic::{solar_csv, weekly_report_csv};

/// Download families with their own fallback rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFamily {
    Solar,
    WeeklyReport,
    Ledger,
}

/// A file request after directory rules have been applied.
#[derive(Debug, Clone)]
pub struct FileRequest {
    pub family: FileFamily,
    /// Directory to look in; `None` when only generated content is wanted.
    pub dir: Option<PathBuf>,
    pub file_name: String,
}

impl FileRequest {
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|dir| dir.join(&self.file_name))
    }
}

/// Bytes ready to be served.
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
    pub synthetic: bool,
}

#[async_trait]
pub trait FileSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when this source has nothing for the request.
    async fn open(&self, request: &FileRequest) -> Result<Option<ServedFile>, ResolveError>;
}

/// Reads files from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSource;

#[async_trait]
impl FileSource for RealFileSource {
    fn name(&self) -> &'static str {
        "disk"
    }

    async fn open(&self, request: &FileRequest) -> Result<Option<ServedFile>, ResolveError> {
        let Some(path) = request.path() else {
            return Ok(None);
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ResolveError::Read { path, source }),
        };
        let body = tokio::fs::read(&path)
            .await
            .map_err(|source| ResolveError::Read {
                path: path.clone(),
                source,
            })?;

        Ok(Some(ServedFile {
            file_name: request.file_name.clone(),
            content_type: content_type_for(&request.file_name),
            body,
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            synthetic: false,
        }))
    }
}

/// Generates placeholder content shaped like the requested file.
///
/// The ledger family has no generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticFileSource;

#[async_trait]
impl FileSource for SyntheticFileSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn open(&self, request: &FileRequest) -> Result<Option<ServedFile>, ResolveError> {
        let now = Utc::now();
        let body = match request.family {
            FileFamily::Solar => solar_csv(&request.file_name, now),
            FileFamily::WeeklyReport => weekly_report_csv(&request.file_name, now.date_naive()),
            FileFamily::Ledger => return Ok(None),
        };

        Ok(Some(ServedFile {
            file_name: request.file_name.clone(),
            content_type: "text/csv",
            body: body.into_bytes(),
            last_modified: None,
            synthetic: true,
        }))
    }
}
