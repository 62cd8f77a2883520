//! Maps download queries onto files, with per-family directory rules.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::Instrument;

use crate::config::Config;
use crate::error::ResolveError;
use crate::files::listing::{find_by_job_id, job_files, list_reports, ReportSummary};
use crate::files::sanitize::{redact_path, validate_component};
use crate::files::source::{
    FileFamily, FileRequest, FileSource, RealFileSource, ServedFile, SyntheticFileSource,
};
use crate::job::{FileDescriptor, JobRegistry};

/// Used when a solar job id has no recorded file.
const DEFAULT_SOLAR_FILE: &str = "data.csv";

/// Query accepted by the solar download endpoint.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolarQuery {
    pub file_name: Option<String>,
    /// Older clients send `file` instead of `fileName`.
    pub file: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    #[serde(alias = "siteId")]
    pub site: Option<String>,
    pub job_id: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub struct FileResolver {
    downloads: PathBuf,
    scripts: PathBuf,
    site_data: PathBuf,
    registry: Arc<JobRegistry>,
    sources: Vec<Box<dyn FileSource>>,
}

impl FileResolver {
    /// Disk first, then generated content when `files.synthetic_fallback` is on.
    pub fn new(config: &Config, registry: Arc<JobRegistry>) -> Self {
        let mut sources: Vec<Box<dyn FileSource>> = vec![Box::new(RealFileSource)];
        if config.files.synthetic_fallback {
            sources.push(Box::new(SyntheticFileSource));
        }
        Self {
            downloads: config.paths.downloads(),
            scripts: config.paths.scripts(),
            site_data: config.paths.site_data(),
            registry,
            sources,
        }
    }

    /// Replaces the source chain.
    pub fn with_sources(mut self, sources: Vec<Box<dyn FileSource>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn solar_dir(&self, platform: &str) -> PathBuf {
        self.downloads.join("amos").join(platform)
    }

    pub fn weekly_report_dir(&self) -> PathBuf {
        self.downloads.join("wpr")
    }

    pub fn ledger_dir(&self) -> PathBuf {
        self.downloads.join("jonas")
    }

    async fn serve(&self, request: &FileRequest) -> Result<ServedFile, ResolveError> {
        let span = tracing::info_span!(
            "resolve_file",
            family = ?request.family,
            file = %request.file_name
        );
        async {
            for source in &self.sources {
                if let Some(file) = source.open(request).await? {
                    if file.synthetic {
                        log::info!(
                            "{} not found on disk, serving {} content",
                            request.file_name,
                            source.name()
                        );
                    } else {
                        log::debug!("Serving {} from {}", request.file_name, source.name());
                    }
                    return Ok(file);
                }
            }
            Err(ResolveError::NotFound(request.file_name.clone()))
        }
        .instrument(span)
        .await
    }

    /// Solar exports: `type=demo` is always generated; `type=locus` and
    /// `type=powertrack` read the platform directory; otherwise a site id
    /// selects the per-site data directory, else the scripts directory.
    pub async fn resolve_solar(&self, query: &SolarQuery) -> Result<ServedFile, ResolveError> {
        let (file_name, file_type) = match non_empty(&query.file_name).or(non_empty(&query.file)) {
            Some(name) => (name.to_string(), non_empty(&query.file_type).map(String::from)),
            None => {
                let job_id = non_empty(&query.job_id)
                    .ok_or(ResolveError::MissingParameter("File name or Job ID required"))?;
                let name = self
                    .registry
                    .get(job_id)
                    .and_then(|record| record.files.first().map(|f| f.file_name.clone()))
                    .unwrap_or_else(|| DEFAULT_SOLAR_FILE.to_string());
                let file_type = non_empty(&query.file_type)
                    .map(String::from)
                    .or_else(|| platform_of(job_id).map(String::from));
                (name, file_type)
            }
        };

        validate_component(&file_name)?;
        let site = non_empty(&query.site).map(validate_component).transpose()?;

        let dir = match file_type.as_deref() {
            Some("demo") => None,
            Some(platform @ ("locus" | "powertrack")) => Some(self.solar_dir(platform)),
            _ => Some(match site {
                Some(site) => self.site_data.join(site),
                None => self.scripts.clone(),
            }),
        };

        let request = FileRequest {
            family: FileFamily::Solar,
            dir,
            file_name,
        };
        if request.dir.is_none() {
            return SyntheticFileSource
                .open(&request)
                .await?
                .ok_or_else(|| ResolveError::NotFound(request.file_name.clone()));
        }
        self.serve(&request).await
    }

    pub async fn resolve_weekly_report(
        &self,
        file_name: Option<&str>,
    ) -> Result<ServedFile, ResolveError> {
        let file_name = file_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ResolveError::MissingParameter("File name required"))?;
        validate_component(file_name)?;

        self.serve(&FileRequest {
            family: FileFamily::WeeklyReport,
            dir: Some(self.weekly_report_dir()),
            file_name: file_name.to_string(),
        })
        .await
    }

    /// An explicit file name wins; otherwise the newest file carrying the
    /// sanitized job id. There is no generated fallback for this family.
    pub async fn resolve_ledger(
        &self,
        job_id: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<ServedFile, ResolveError> {
        let job_id = job_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ResolveError::MissingParameter("Job ID required"))?;
        let dir = self.ledger_dir();

        let file_name = match file_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => validate_component(name)?.to_string(),
            None => {
                let path = find_by_job_id(&dir, job_id)
                    .await
                    .map_err(|source| ResolveError::Read {
                        path: dir.clone(),
                        source,
                    })?
                    .ok_or_else(|| ResolveError::NotFound(job_id.to_string()))?;
                log::debug!("Resolved job {} to {}", job_id, redact_path(&path));
                file_name_of(&path)
            }
        };

        self.serve(&FileRequest {
            family: FileFamily::Ledger,
            dir: Some(dir),
            file_name,
        })
        .await
    }

    /// Raw HTML of a ledger report, for inline display.
    pub async fn preview(&self, file_name: Option<&str>) -> Result<String, ResolveError> {
        let file_name = file_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ResolveError::MissingParameter("File name required"))?;
        validate_component(file_name)?;

        let path = self.ledger_dir().join(file_name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ResolveError::NotFound(file_name.to_string()));
        }
        if !file_name.to_lowercase().ends_with(".html") {
            return Err(ResolveError::NotPreviewable);
        }
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ResolveError::Read { path, source })
    }

    pub async fn ledger_files(&self, job_id: &str) -> Result<Vec<FileDescriptor>, ResolveError> {
        let dir = self.ledger_dir();
        job_files(&dir, job_id)
            .await
            .map_err(|source| ResolveError::Read { path: dir, source })
    }

    pub async fn weekly_reports(&self) -> Result<Vec<ReportSummary>, ResolveError> {
        let dir = self.weekly_report_dir();
        list_reports(&dir)
            .await
            .map_err(|source| ResolveError::Read { path: dir, source })
    }
}

/// Solar platform named by a job id prefix.
fn platform_of(job_id: &str) -> Option<&'static str> {
    if job_id.contains("powertrack") {
        Some("powertrack")
    } else if job_id.contains("locus") {
        Some("locus")
    } else {
        None
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobMode, JobRecord};
    use std::time::Duration;
    use tempfile::TempDir;

    fn resolver(dir: &TempDir) -> (FileResolver, Arc<JobRegistry>) {
        let registry = Arc::new(JobRegistry::new(10, Duration::from_secs(60)));
        let config = Config::with_root(dir.path());
        (FileResolver::new(&config, Arc::clone(&registry)), registry)
    }

    fn query(name: &str, file_type: Option<&str>) -> SolarQuery {
        SolarQuery {
            file_name: Some(name.to_string()),
            file_type: file_type.map(String::from),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_solar_platform_dir() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        let locus = resolver.solar_dir("locus");
        std::fs::create_dir_all(&locus).unwrap();
        std::fs::write(locus.join("north_site.csv"), "real\n").unwrap();

        let served = resolver
            .resolve_solar(&query("north_site.csv", Some("locus")))
            .await
            .unwrap();
        assert_eq!(served.body, b"real\n");
        assert!(!served.synthetic);
    }

    #[tokio::test]
    async fn test_solar_missing_falls_back_to_synthetic() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        let served = resolver
            .resolve_solar(&query("weather_station_data.csv", Some("powertrack")))
            .await
            .unwrap();
        assert!(served.synthetic);
        let text = String::from_utf8(served.body).unwrap();
        assert!(text.starts_with("timestamp,component_id,insolation,"));
    }

    #[tokio::test]
    async fn test_solar_without_fallback_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_root(dir.path());
        config.files.synthetic_fallback = false;
        let registry = Arc::new(JobRegistry::new(10, Duration::from_secs(60)));
        let resolver = FileResolver::new(&config, registry);

        let result = resolver.resolve_solar(&query("meter.csv", Some("locus"))).await;
        assert!(matches!(result, Err(ResolveError::NotFound(_))));

        // An explicit demo request is always generated.
        let demo = resolver.resolve_solar(&query("meter.csv", Some("demo"))).await;
        assert!(demo.unwrap().synthetic);
    }

    #[tokio::test]
    async fn test_solar_site_dir() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        let site_dir = dir.path().join("app/services/data/site-9");
        std::fs::create_dir_all(&site_dir).unwrap();
        std::fs::write(site_dir.join("export.csv"), "site\n").unwrap();

        let mut q = query("export.csv", None);
        q.site = Some("site-9".to_string());
        assert_eq!(resolver.resolve_solar(&q).await.unwrap().body, b"site\n");

        q.site = Some("../etc".to_string());
        assert!(matches!(
            resolver.resolve_solar(&q).await,
            Err(ResolveError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_solar_job_id_uses_registry_file() {
        let dir = TempDir::new().unwrap();
        let (resolver, registry) = resolver(&dir);
        let pt = resolver.solar_dir("powertrack");
        std::fs::create_dir_all(&pt).unwrap();
        let path = pt.join("powertrack_PT1_demo_1.csv");
        std::fs::write(&path, "pt\n").unwrap();

        let mut record = JobRecord::starting(JobMode::Demo, "Starting");
        record.complete(
            "done",
            vec![FileDescriptor::from_path(&path, "/x".to_string()).unwrap()],
            5000,
        );
        registry.set("powertrack_job_1", record).unwrap();

        let q = SolarQuery {
            job_id: Some("powertrack_job_1".to_string()),
            ..Default::default()
        };
        assert_eq!(resolver.resolve_solar(&q).await.unwrap().body, b"pt\n");
    }

    #[tokio::test]
    async fn test_solar_requires_name_or_job() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        let result = resolver.resolve_solar(&SolarQuery::default()).await;
        assert!(matches!(
            result,
            Err(ResolveError::MissingParameter("File name or Job ID required"))
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected_in_every_family() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        assert!(matches!(
            resolver.resolve_solar(&query("../secret.csv", Some("locus"))).await,
            Err(ResolveError::InvalidName(_))
        ));
        assert!(matches!(
            resolver.resolve_weekly_report(Some("..\\WPR.csv")).await,
            Err(ResolveError::InvalidName(_))
        ));
        assert!(matches!(
            resolver.resolve_ledger(Some("vendor_job_1"), Some("a/b.html")).await,
            Err(ResolveError::InvalidName(_))
        ));
        assert!(matches!(
            resolver.preview(Some("../x.html")).await,
            Err(ResolveError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn test_weekly_report_fallback() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        let served = resolver
            .resolve_weekly_report(Some("WPR_2025_Week_02.csv"))
            .await
            .unwrap();
        let text = String::from_utf8(served.body).unwrap();
        assert_eq!(text.lines().count(), 23);
        assert!(matches!(
            resolver.resolve_weekly_report(None).await,
            Err(ResolveError::MissingParameter("File name required"))
        ));
    }

    #[tokio::test]
    async fn test_ledger_lookup() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        let jonas = resolver.ledger_dir();
        std::fs::create_dir_all(&jonas).unwrap();
        std::fs::write(jonas.join("vendor_job_5_report.html"), "<p>hi</p>").unwrap();

        let served = resolver.resolve_ledger(Some("vendor_job_5"), None).await.unwrap();
        assert_eq!(served.file_name, "vendor_job_5_report.html");
        assert_eq!(served.content_type, "text/html");

        assert!(matches!(
            resolver.resolve_ledger(Some("vendor_job_6"), None).await,
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(
            resolver.resolve_ledger(None, None).await,
            Err(ResolveError::MissingParameter("Job ID required"))
        ));
    }

    #[tokio::test]
    async fn test_preview() {
        let dir = TempDir::new().unwrap();
        let (resolver, _) = resolver(&dir);
        let jonas = resolver.ledger_dir();
        std::fs::create_dir_all(&jonas).unwrap();
        std::fs::write(jonas.join("r.html"), "<table></table>").unwrap();
        std::fs::write(jonas.join("r.xlsx"), "bin").unwrap();

        assert_eq!(resolver.preview(Some("r.html")).await.unwrap(), "<table></table>");
        assert!(matches!(
            resolver.preview(Some("r.xlsx")).await,
            Err(ResolveError::NotPreviewable)
        ));
        assert!(matches!(
            resolver.preview(Some("missing.html")).await,
            Err(ResolveError::NotFound(_))
        ));
    }
}
