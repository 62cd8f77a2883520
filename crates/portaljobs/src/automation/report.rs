//! Weekly performance report generation.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::automation::{
    describe, ensure_dir, flag, script_exists, write_file, Automation, AutomationContext, Collected,
    PlatformInfo, Prepared,
};
use crate::error::AutomationError;
use crate::files::listing::{encode, scan_dir};
use crate::files::synthetic::{wpr_demo_csv, wpr_file_name};
use crate::job::JobId;
use crate::process::ProcessOutcome;
use crate::progress::{record_count, WPR_MARKERS};

pub static WPR: PlatformInfo = PlatformInfo {
    name: "WPR",
    job_prefix: "wpr_job",
    family: "wpr",
    markers: WPR_MARKERS,
    initializing: "Initializing WPR generation...",
    starting: "Starting WPR generation script...",
    submitted_real: "WPR generation started successfully",
    submitted_demo: "Demo mode: Simulating WPR generation",
    demo_steps: [
        "Demo: Collecting solar project data...",
        "Demo: Calculating performance metrics...",
    ],
    demo_completed: "Demo: WPR generated successfully",
    failure: "WPR generation failed",
};

const DEFAULT_RECORD_COUNT: u64 = 200;
const DEMO_RECORD_COUNT: u64 = 50;

fn default_report_type() -> String {
    "current_week".to_string()
}

fn default_true() -> bool {
    true
}

/// Body of `POST /jobs/wpr/generate`. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    #[serde(default = "default_report_type")]
    pub report_type: String,
    #[serde(default = "default_true")]
    pub include_charts: bool,
    #[serde(default = "default_true")]
    pub include_maintenance: bool,
    #[serde(default)]
    pub include_weather_data: bool,
}

impl Default for ReportRequest {
    fn default() -> Self {
        Self {
            report_type: default_report_type(),
            include_charts: true,
            include_maintenance: true,
            include_weather_data: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportAutomation {
    request: ReportRequest,
}

impl ReportAutomation {
    pub fn new(request: ReportRequest) -> Self {
        Self { request }
    }

    fn script(ctx: &AutomationContext) -> PathBuf {
        ctx.scripts.join("wpr_generator.py")
    }

    fn output_dir(ctx: &AutomationContext) -> PathBuf {
        ctx.downloads.join("wpr")
    }
}

fn report_url(file_name: &str) -> String {
    format!("/jobs/wpr/download?fileName={}", encode(file_name))
}

#[async_trait]
impl Automation for ReportAutomation {
    fn info(&self) -> &'static PlatformInfo {
        &WPR
    }

    async fn available(&self, ctx: &AutomationContext) -> bool {
        script_exists(&Self::script(ctx))
    }

    async fn prepare(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
    ) -> Result<Prepared, AutomationError> {
        let request = &self.request;
        let spec = ctx
            .interpreter
            .script(&Self::script(ctx))
            .args(["--report_type", request.report_type.as_str()])
            .args(["--include_charts", flag(request.include_charts)])
            .args(["--include_maintenance", flag(request.include_maintenance)])
            .args(["--include_weather", flag(request.include_weather_data)]);
        Ok(Prepared::new(spec))
    }

    async fn collect(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
        outcome: &ProcessOutcome,
    ) -> Result<Collected, AutomationError> {
        let dir = Self::output_dir(ctx);
        let found = scan_dir(&dir, |name| {
            let lower = name.to_lowercase();
            lower.ends_with(".csv") && lower.contains("wpr")
        })
        .await
        .map_err(|source| AutomationError::ReadDir {
            path: dir.clone(),
            source,
        })?;

        let mut files = Vec::with_capacity(found.len());
        for (path, _) in &found {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            files.push(describe(path, report_url(&name))?);
        }

        Ok(Collected {
            message: format!(
                "WPR generated successfully! {} file(s) ready for download.",
                files.len()
            ),
            files,
            record_count: record_count(&outcome.stdout).unwrap_or(DEFAULT_RECORD_COUNT),
        })
    }

    async fn demo(
        &self,
        ctx: &AutomationContext,
        _job_id: &JobId,
    ) -> Result<Collected, AutomationError> {
        let dir = Self::output_dir(ctx);
        ensure_dir(&dir).await?;

        let today = Utc::now().date_naive();
        let name = wpr_file_name(today);
        let path = dir.join(&name);
        write_file(&path, wpr_demo_csv(today).as_bytes()).await?;

        Ok(Collected {
            files: vec![describe(&path, report_url(&name))?],
            record_count: DEMO_RECORD_COUNT,
            message: WPR.demo_completed.to_string(),
        })
    }
}
