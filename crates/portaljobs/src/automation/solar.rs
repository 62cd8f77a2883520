//! Solar monitoring exports: Locus Energy and PowerTrack.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::automation::{
    describe, ensure_dir, flag, required, script_exists, write_file, Automation, AutomationContext,
    Collected, PlatformInfo, Prepared,
};
use crate::error::AutomationError;
use crate::files::listing::{encode, scan_dir};
use crate::files::sanitize::sanitize_job_id;
use crate::files::synthetic::{
    powertrack_demo_csv, powertrack_placeholder_csv, solar_series, SolarKind,
};
use crate::job::JobId;
use crate::process::ProcessOutcome;
use crate::progress::{record_count, LOCUS_MARKERS, POWERTRACK_MARKERS};

pub static LOCUS: PlatformInfo = PlatformInfo {
    name: "Locus Energy",
    job_prefix: "locus_job",
    family: "amos",
    markers: LOCUS_MARKERS,
    initializing: "Initializing Locus Energy automation...",
    starting: "Starting Locus Energy automation script...",
    submitted_real: "Locus Energy automation started successfully",
    submitted_demo: "Demo mode: Simulating Locus Energy automation",
    demo_steps: [
        "Demo: Connecting to Locus Energy platform...",
        "Demo: Extracting solar monitoring data...",
    ],
    demo_completed: "Demo: Locus Energy data extraction completed",
    failure: "Locus automation failed",
};

pub static POWERTRACK: PlatformInfo = PlatformInfo {
    name: "PowerTrack",
    job_prefix: "powertrack_job",
    family: "amos",
    markers: POWERTRACK_MARKERS,
    initializing: "Initializing PowerTrack automation...",
    starting: "Starting PowerTrack automation script...",
    submitted_real: "PowerTrack automation started successfully",
    submitted_demo: "Demo mode: Simulating PowerTrack automation",
    demo_steps: [
        "Demo: Connecting to PowerTrack platform...",
        "Demo: Extracting asset performance data...",
    ],
    demo_completed: "Demo: PowerTrack data extraction completed",
    failure: "PowerTrack automation failed",
};

const LOCUS_RECORD_COUNT: u64 = 1000;
const LOCUS_DEMO_RECORD_COUNT: u64 = 100;
const POWERTRACK_RECORD_COUNT: u64 = 5000;
const POWERTRACK_DEMO_RECORD_COUNT: u64 = 200;

/// Body of `POST /jobs/amos/locus`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocusRequest {
    pub site_name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub show_browser: bool,
}

#[derive(Debug, Clone)]
pub struct LocusAutomation {
    site_name: String,
    start_date: String,
    end_date: String,
    email: String,
    password: Option<String>,
    show_browser: bool,
}

impl LocusAutomation {
    pub fn new(request: LocusRequest) -> Result<Self, AutomationError> {
        match (
            required(&request.site_name),
            required(&request.start_date),
            required(&request.end_date),
            required(&request.email),
        ) {
            (Some(site_name), Some(start_date), Some(end_date), Some(email)) => Ok(Self {
                site_name: site_name.to_string(),
                start_date: start_date.to_string(),
                end_date: end_date.to_string(),
                email: email.to_string(),
                password: request.password.filter(|p| !p.is_empty()),
                show_browser: request.show_browser,
            }),
            _ => Err(AutomationError::Validation(
                "Missing required fields: site_name, start_date, end_date, email".to_string(),
            )),
        }
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    fn script(ctx: &AutomationContext) -> PathBuf {
        ctx.scripts.join("locus_automation.py")
    }

    fn output_dir(ctx: &AutomationContext) -> PathBuf {
        ctx.downloads.join("amos").join("locus")
    }
}

fn locus_url(file_name: &str) -> String {
    format!("/jobs/amos/download?file={}&type=locus", encode(file_name))
}

#[async_trait]
impl Automation for LocusAutomation {
    fn info(&self) -> &'static PlatformInfo {
        &LOCUS
    }

    async fn available(&self, ctx: &AutomationContext) -> bool {
        script_exists(&Self::script(ctx))
    }

    async fn prepare(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
    ) -> Result<Prepared, AutomationError> {
        let output_dir = Self::output_dir(ctx);
        ensure_dir(&output_dir).await?;

        let mut spec = ctx
            .interpreter
            .script(&Self::script(ctx))
            .args(["--site_name", self.site_name.as_str()])
            .args(["--start_date", self.start_date.as_str()])
            .args(["--end_date", self.end_date.as_str()])
            .args(["--email", self.email.as_str()]);
        if let Some(password) = &self.password {
            spec = spec.args(["--password", password.as_str()]);
        }
        let spec = spec
            .args(["--headless", flag(!self.show_browser)])
            .arg("--output_dir")
            .arg(output_dir.display().to_string());
        Ok(Prepared::new(spec))
    }

    async fn collect(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
        _outcome: &ProcessOutcome,
    ) -> Result<Collected, AutomationError> {
        let dir = Self::output_dir(ctx);
        let site = self.site_name.to_lowercase();
        let found = scan_dir(&dir, |name| name.contains(&site) && name.ends_with(".csv"))
            .await
            .map_err(|source| AutomationError::ReadDir {
                path: dir.clone(),
                source,
            })?;

        let mut files = Vec::with_capacity(found.len());
        for (path, _) in &found {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            files.push(describe(path, locus_url(&name))?);
        }

        Ok(Collected {
            message: format!(
                "Locus Energy data extraction completed successfully! Generated {} files.",
                files.len()
            ),
            files,
            record_count: LOCUS_RECORD_COUNT,
        })
    }

    async fn demo(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
    ) -> Result<Collected, AutomationError> {
        let dir = Self::output_dir(ctx);
        ensure_dir(&dir).await?;

        let name = format!("{}_demo_data.csv", sanitize_job_id(&self.site_name));
        let path = dir.join(&name);
        write_file(&path, solar_series(SolarKind::Energy, Utc::now()).as_bytes()).await?;

        Ok(Collected {
            files: vec![describe(&path, locus_url(&name))?],
            record_count: LOCUS_DEMO_RECORD_COUNT,
            message: LOCUS.demo_completed.to_string(),
        })
    }
}

/// Body of `POST /jobs/amos/powertrack`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PowerTrackRequest {
    pub monitoring_platform_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub show_browser: bool,
}

#[derive(Debug, Clone)]
pub struct PowerTrackAutomation {
    platform_id: String,
    start_date: String,
    end_date: String,
    show_browser: bool,
}

impl PowerTrackAutomation {
    pub fn new(request: PowerTrackRequest) -> Result<Self, AutomationError> {
        match (
            required(&request.monitoring_platform_id),
            required(&request.start_date),
            required(&request.end_date),
        ) {
            (Some(platform_id), Some(start_date), Some(end_date)) => Ok(Self {
                platform_id: platform_id.to_string(),
                start_date: start_date.to_string(),
                end_date: end_date.to_string(),
                show_browser: request.show_browser,
            }),
            _ => Err(AutomationError::Validation(
                "Missing required fields: monitoring_platform_id, start_date, end_date"
                    .to_string(),
            )),
        }
    }

    fn script(ctx: &AutomationContext) -> PathBuf {
        ctx.scripts
            .join("powertrack_automation")
            .join("powertrack_automation.py")
    }

    fn output_dir(ctx: &AutomationContext) -> PathBuf {
        ctx.downloads.join("amos").join("powertrack")
    }
}

fn powertrack_url(file_name: &str) -> String {
    format!(
        "/jobs/amos/download?fileName={}&type=powertrack",
        encode(file_name)
    )
}

#[async_trait]
impl Automation for PowerTrackAutomation {
    fn info(&self) -> &'static PlatformInfo {
        &POWERTRACK
    }

    async fn available(&self, ctx: &AutomationContext) -> bool {
        script_exists(&Self::script(ctx))
    }

    async fn prepare(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
    ) -> Result<Prepared, AutomationError> {
        let spec = ctx
            .interpreter
            .script(&Self::script(ctx))
            .args(["--monitoring_platform_id", self.platform_id.as_str()])
            .args(["--start_date", self.start_date.as_str()])
            .args(["--end_date", self.end_date.as_str()])
            .args(["--show_browser", flag(self.show_browser)])
            .env("PYTHONPATH", ctx.scripts.display().to_string());
        Ok(Prepared::new(spec))
    }

    /// Every CSV in the output directory, newest first. A run that left no
    /// directory gets a placeholder export.
    async fn collect(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
        outcome: &ProcessOutcome,
    ) -> Result<Collected, AutomationError> {
        let dir = Self::output_dir(ctx);
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            log::warn!("PowerTrack output directory missing, writing placeholder");
            ensure_dir(&dir).await?;
            let name = format!(
                "powertrack_{}_{}.csv",
                sanitize_job_id(&self.platform_id),
                Utc::now().timestamp_millis()
            );
            write_file(&dir.join(name), powertrack_placeholder_csv(Utc::now()).as_bytes()).await?;
        }

        let found = scan_dir(&dir, |name| name.ends_with(".csv"))
            .await
            .map_err(|source| AutomationError::ReadDir {
                path: dir.clone(),
                source,
            })?;
        let mut files = Vec::with_capacity(found.len());
        for (path, _) in &found {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            files.push(describe(path, powertrack_url(&name))?);
        }

        Ok(Collected {
            message: format!(
                "PowerTrack data extraction completed successfully! Generated {} CSV file(s) ready for download.",
                files.len()
            ),
            files,
            record_count: record_count(&outcome.stdout).unwrap_or(POWERTRACK_RECORD_COUNT),
        })
    }

    async fn demo(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
    ) -> Result<Collected, AutomationError> {
        let dir = Self::output_dir(ctx);
        ensure_dir(&dir).await?;

        let now = Utc::now();
        let name = format!(
            "powertrack_{}_demo_{}.csv",
            sanitize_job_id(&self.platform_id),
            now.timestamp_millis()
        );
        let path = dir.join(&name);
        write_file(&path, powertrack_demo_csv(&self.platform_id, now).as_bytes()).await?;

        Ok(Collected {
            files: vec![describe(&path, powertrack_url(&name))?],
            record_count: POWERTRACK_DEMO_RECORD_COUNT,
            message: POWERTRACK.demo_completed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::process::{ExitReason, Interpreter};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> AutomationContext {
        let config = Config::with_root(dir.path());
        AutomationContext::new(&config, Arc::new(Interpreter::new("python3", dir.path())))
    }

    fn outcome(stdout: &str) -> ProcessOutcome {
        ProcessOutcome {
            reason: ExitReason::Exited(Some(0)),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn locus_request() -> LocusRequest {
        LocusRequest {
            site_name: Some("North Site".to_string()),
            start_date: Some("2025-01-01".to_string()),
            end_date: Some("2025-01-31".to_string()),
            email: Some("ops@example.com".to_string()),
            password: Some("hunter2".to_string()),
            show_browser: false,
        }
    }

    #[test]
    fn test_locus_validation() {
        let mut request = locus_request();
        request.email = Some("  ".to_string());
        let err = LocusAutomation::new(request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required fields: site_name, start_date, end_date, email"
        );
    }

    #[tokio::test]
    async fn test_locus_command() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let automation = LocusAutomation::new(locus_request()).unwrap();
        let prepared = automation
            .prepare(&ctx, &JobId::from("locus_job_1"))
            .await
            .unwrap();

        let args = &prepared.spec.args;
        assert!(args[0].ends_with("locus_automation.py"));
        assert_eq!(args[1..3], ["--site_name", "North Site"]);
        let headless = args.iter().position(|a| a == "--headless").unwrap();
        assert_eq!(args[headless + 1], "true");
        assert!(!prepared.spec.display().contains("hunter2"));
        assert!(dir.path().join("downloads/amos/locus").is_dir());
    }

    #[tokio::test]
    async fn test_locus_collects_site_files() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let out = dir.path().join("downloads/amos/locus");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("north site_2025.csv"), "x").unwrap();
        std::fs::write(out.join("south site_2025.csv"), "x").unwrap();

        let automation = LocusAutomation::new(locus_request()).unwrap();
        let collected = automation
            .collect(&ctx, &JobId::from("locus_job_1"), &outcome(""))
            .await
            .unwrap();
        assert_eq!(collected.files.len(), 1);
        assert_eq!(collected.record_count, 1000);
        assert_eq!(
            collected.files[0].download_url,
            "/jobs/amos/download?file=north+site_2025.csv&type=locus"
        );
        assert_eq!(
            collected.message,
            "Locus Energy data extraction completed successfully! Generated 1 files."
        );
    }

    #[tokio::test]
    async fn test_locus_demo_writes_one_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let automation = LocusAutomation::new(locus_request()).unwrap();
        let collected = automation
            .demo(&ctx, &JobId::from("locus_job_1"))
            .await
            .unwrap();
        assert_eq!(collected.files.len(), 1);
        assert_eq!(collected.files[0].file_name, "North_Site_demo_data.csv");
        let content =
            std::fs::read_to_string(dir.path().join("downloads/amos/locus/North_Site_demo_data.csv"))
                .unwrap();
        assert!(content.starts_with("Site Time,"));
    }

    #[tokio::test]
    async fn test_powertrack_placeholder_when_dir_missing() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let automation = PowerTrackAutomation::new(PowerTrackRequest {
            monitoring_platform_id: Some("PT-42".to_string()),
            start_date: Some("2025-01-01".to_string()),
            end_date: Some("2025-03-31".to_string()),
            show_browser: true,
        })
        .unwrap();

        let collected = automation
            .collect(&ctx, &JobId::from("powertrack_job_1"), &outcome("Total records: 812\n"))
            .await
            .unwrap();
        assert_eq!(collected.files.len(), 1);
        assert!(collected.files[0].file_name.starts_with("powertrack_PT_42_"));
        assert_eq!(collected.record_count, 812);
        assert!(collected.files[0].download_url.ends_with("&type=powertrack"));
    }

    #[tokio::test]
    async fn test_powertrack_command_sets_module_path() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let automation = PowerTrackAutomation::new(PowerTrackRequest {
            monitoring_platform_id: Some("PT-42".to_string()),
            start_date: Some("2025-01-01".to_string()),
            end_date: Some("2025-03-31".to_string()),
            show_browser: true,
        })
        .unwrap();
        let prepared = automation
            .prepare(&ctx, &JobId::from("powertrack_job_1"))
            .await
            .unwrap();
        assert_eq!(
            prepared.spec.env,
            vec![(
                "PYTHONPATH".to_string(),
                dir.path().join("automation_scripts").display().to_string()
            )]
        );
        assert_eq!(prepared.spec.args.last().map(String::as_str), Some("true"));
        assert!(!automation.available(&ctx).await);
    }
}
