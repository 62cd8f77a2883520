//! General-ledger reports from AM Automation: vendor and account runs.
//!
//! Both run the same browser script with a JSON config file. The script
//! announces each saved report on stdout; those files are copied into the
//! ledger downloads directory under the job id and listed from there.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::automation::{
    describe, ensure_dir, required, script_exists, write_file, Automation, AutomationContext,
    Collected, PlatformInfo, Prepared,
};
use crate::error::AutomationError;
use crate::files::listing::{job_files, ledger_download_url};
use crate::files::synthetic::ledger_html;
use crate::job::JobId;
use crate::process::ProcessOutcome;
use crate::progress::LEDGER_MARKERS;

const VENDORS_INFO: PlatformInfo = PlatformInfo {
    name: "AM Automation vendors",
    job_prefix: "vendor_job",
    family: "jonas",
    markers: LEDGER_MARKERS,
    initializing: "Initializing AM Automation...",
    starting: "Starting AM Automation script...",
    submitted_real: "AM Automation started successfully",
    submitted_demo: "Demo mode: Simulating AM Automation",
    demo_steps: [
        "Demo: Logging in to AM Automation...",
        "Demo: Generating vendor report...",
    ],
    demo_completed: "Demo mode - AM Automation completed",
    failure: "AM Automation failed",
};

pub static VENDORS: PlatformInfo = VENDORS_INFO;

pub static ACCOUNTS: PlatformInfo = PlatformInfo {
    name: "AM Automation accounts",
    job_prefix: "account_job",
    demo_steps: [
        "Demo: Logging in to AM Automation...",
        "Demo: Generating account reports...",
    ],
    ..VENDORS_INFO
};

/// Modules the browser script imports.
pub const DEPENDENCY_MODULES: [&str; 3] = ["playwright.sync_api", "pandas", "json"];

static OUTPUT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"SUCCESS: Saved HTML file to: (.+\.html)",
        r"SUCCESS: Successfully converted HTML to Excel: (.+\.xlsx)",
        r"Downloaded vendor report to: (.+\.xlsx)",
        r"Downloaded account report to: (.+\.xlsx)",
        r"SUCCESS: Downloaded .* report: (.+\.xlsx)",
        r"SUCCESS: Downloaded .* report: (.+\.html)",
        r"SUCCESS: Successfully downloaded: (.+\.xlsx)",
        r"SUCCESS: Successfully downloaded: (.+\.html)",
        r"Created demo .* file: (.+\.(xlsx|html))",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid regex"))
    .collect()
});

/// Report paths announced in the script output, in pattern order, deduplicated.
pub fn parse_output_paths(stdout: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for pattern in OUTPUT_PATTERNS.iter() {
        for caps in pattern.captures_iter(stdout) {
            if let Some(m) = caps.get(1) {
                let path = m.as_str().trim().to_string();
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
    }
    paths
}

/// Body of `POST /jobs/jonas/vendors` and `POST /jobs/jonas/accounts`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRequest {
    pub vendors: Option<Vec<String>>,
    pub accounts: Option<Vec<AccountRequest>>,
    pub credentials: Option<Value>,
    pub email_config: Option<Value>,
    #[serde(default)]
    pub show_browser: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub code: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub code: String,
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone)]
enum LedgerTask {
    Vendors(Vec<String>),
    Accounts(Vec<Account>),
}

#[derive(Debug, Clone)]
pub struct LedgerAutomation {
    task: LedgerTask,
    credentials: Value,
    email: Value,
    show_browser: bool,
}

impl LedgerAutomation {
    pub fn vendors(request: LedgerRequest) -> Result<Self, AutomationError> {
        let vendors: Vec<String> = request
            .vendors
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if vendors.is_empty() {
            return Err(AutomationError::Validation("No vendors provided".to_string()));
        }
        Ok(Self {
            task: LedgerTask::Vendors(vendors),
            credentials: request.credentials.unwrap_or(Value::Null),
            email: request.email_config.unwrap_or(Value::Null),
            show_browser: request.show_browser,
        })
    }

    pub fn accounts(request: LedgerRequest) -> Result<Self, AutomationError> {
        let requested = request.accounts.unwrap_or_default();
        if requested.is_empty() {
            return Err(AutomationError::Validation("No accounts provided".to_string()));
        }

        let mut accounts = Vec::with_capacity(requested.len());
        for account in &requested {
            match (
                required(&account.code),
                required(&account.start_date),
                required(&account.end_date),
            ) {
                (Some(code), Some(start_date), Some(end_date)) => accounts.push(Account {
                    code: code.to_string(),
                    start_date: start_date.to_string(),
                    end_date: end_date.to_string(),
                }),
                _ => {
                    return Err(AutomationError::Validation(
                        "Invalid account data: missing required fields".to_string(),
                    ))
                }
            }
        }

        Ok(Self {
            task: LedgerTask::Accounts(accounts),
            credentials: request.credentials.unwrap_or(Value::Null),
            email: request.email_config.unwrap_or(Value::Null),
            show_browser: request.show_browser,
        })
    }

    fn script_dir(ctx: &AutomationContext) -> PathBuf {
        ctx.scripts.join("jonas")
    }

    fn output_dir(ctx: &AutomationContext) -> PathBuf {
        ctx.downloads.join("jonas")
    }

    /// Config handed to the browser script through `--config`.
    pub fn script_config(&self) -> Value {
        match &self.task {
            LedgerTask::Vendors(vendors) => json!({
                "type": "vendors",
                "vendors": vendors,
                "credentials": self.credentials,
                "email": self.email,
                "showBrowser": self.show_browser,
            }),
            LedgerTask::Accounts(accounts) => json!({
                "type": "accounts",
                "accounts": accounts,
                "credentials": self.credentials,
                "email": self.email,
                "showBrowser": self.show_browser,
            }),
        }
    }

    /// File name and HTML of the report a demo run leaves behind.
    fn demo_report(&self, job_id: &JobId) -> (String, String) {
        let mut rng = rand::thread_rng();
        match &self.task {
            LedgerTask::Vendors(vendors) => {
                let rows: Vec<Vec<String>> = vendors
                    .iter()
                    .map(|vendor| {
                        vec![
                            vendor.clone(),
                            rng.gen_range(1..=5).to_string(),
                            format!("${:.2}", rng.gen_range(1000.0..11000.0)),
                            "Demo Data".to_string(),
                        ]
                    })
                    .collect();
                (
                    format!("{}_vendor_output.html", job_id),
                    ledger_html(
                        "AM Automation - Vendor Report (Demo)",
                        job_id.as_str(),
                        &["Vendor Name", "Pending Invoices", "Total Amount", "Status"],
                        &rows,
                    ),
                )
            }
            LedgerTask::Accounts(accounts) => {
                let rows: Vec<Vec<String>> = accounts
                    .iter()
                    .map(|account| {
                        vec![
                            account.code.clone(),
                            format!("{} to {}", account.start_date, account.end_date),
                            rng.gen_range(5..=120).to_string(),
                            format!("${:.2}", rng.gen_range(-5000.0..25000.0)),
                            "Demo Data".to_string(),
                        ]
                    })
                    .collect();
                (
                    format!("{}_account_output.html", job_id),
                    ledger_html(
                        "AM Automation - Account Report (Demo)",
                        job_id.as_str(),
                        &["Account Code", "Date Range", "Transactions", "Balance", "Status"],
                        &rows,
                    ),
                )
            }
        }
    }

    /// Copies each announced report to `{job_id}_{name}` in the downloads
    /// directory and removes the original. Missing sources are skipped.
    async fn move_outputs(&self, ctx: &AutomationContext, job_id: &JobId, paths: &[String]) {
        let script_dir = Self::script_dir(ctx);
        let output_dir = Self::output_dir(ctx);

        for announced in paths {
            let source = resolve_against(&script_dir, announced);
            let Some(name) = source.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let destination = output_dir.join(format!("{}_{}", job_id, name));

            if let Err(e) = tokio::fs::copy(&source, &destination).await {
                log::error!("Failed to move report {}: {}", source.display(), e);
                continue;
            }
            log::info!("Moved report {} -> {}", source.display(), destination.display());
            if let Err(e) = tokio::fs::remove_file(&source).await {
                log::warn!("Could not delete original report {}: {}", source.display(), e);
            }
        }
    }
}

fn resolve_against(dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

#[async_trait]
impl Automation for LedgerAutomation {
    fn info(&self) -> &'static PlatformInfo {
        match self.task {
            LedgerTask::Vendors(_) => &VENDORS,
            LedgerTask::Accounts(_) => &ACCOUNTS,
        }
    }

    async fn available(&self, ctx: &AutomationContext) -> bool {
        script_exists(&Self::script_dir(ctx).join("jonas_browser_api.py"))
            && ctx.interpreter.check_modules(&DEPENDENCY_MODULES).await
    }

    async fn prepare(
        &self,
        ctx: &AutomationContext,
        job_id: &JobId,
    ) -> Result<Prepared, AutomationError> {
        ctx.interpreter.warmup().await;

        let script_dir = Self::script_dir(ctx);
        ensure_dir(&script_dir).await?;
        ensure_dir(&Self::output_dir(ctx)).await?;

        let config_path = script_dir.join(format!(
            "config_{}_{}.json",
            job_id,
            Utc::now().timestamp_millis()
        ));
        let config = serde_json::to_vec_pretty(&self.script_config())
            .map_err(|e| AutomationError::Prepare(e.to_string()))?;
        write_file(&config_path, &config).await?;

        let spec = ctx
            .interpreter
            .script(&script_dir.join("jonas_browser_api.py"))
            .arg("--config")
            .arg(config_path.display().to_string())
            .arg(if self.show_browser {
                "--show-browser"
            } else {
                "--headless"
            })
            .cwd(&script_dir)
            .env("PYTHONPATH", script_dir.display().to_string());

        Ok(Prepared {
            spec,
            scratch: vec![config_path],
        })
    }

    async fn collect(
        &self,
        ctx: &AutomationContext,
        job_id: &JobId,
        outcome: &ProcessOutcome,
    ) -> Result<Collected, AutomationError> {
        let announced = parse_output_paths(&outcome.stdout);
        log::debug!("Job {} announced {} report(s)", job_id, announced.len());
        self.move_outputs(ctx, job_id, &announced).await;

        let dir = Self::output_dir(ctx);
        let files = job_files(&dir, job_id.as_str())
            .await
            .map_err(|source| AutomationError::ReadDir { path: dir, source })?;

        Ok(Collected {
            message: format!(
                "AM Automation completed successfully! {} file(s) ready for download.",
                files.len()
            ),
            record_count: files.len() as u64,
            files,
        })
    }

    async fn demo(
        &self,
        ctx: &AutomationContext,
        job_id: &JobId,
    ) -> Result<Collected, AutomationError> {
        let dir = Self::output_dir(ctx);
        ensure_dir(&dir).await?;

        let (name, html) = self.demo_report(job_id);

        let path = dir.join(&name);
        write_file(&path, html.as_bytes()).await?;

        Ok(Collected {
            files: vec![describe(&path, ledger_download_url(job_id.as_str(), &name))?],
            record_count: 1,
            message: self.info().demo_completed.to_string(),
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

    fn vendors(names: &[&str]) -> LedgerRequest {
        LedgerRequest {
            vendors: Some(names.iter().map(|n| n.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_output_paths() {
        let stdout = "\
Navigating...
SUCCESS: Saved HTML file to: out/vendors.html
SUCCESS: Successfully converted HTML to Excel: out/vendors.xlsx
SUCCESS: Saved HTML file to: out/vendors.html
Created demo account file: /tmp/acct.xlsx
";
        assert_eq!(
            parse_output_paths(stdout),
            vec!["out/vendors.html", "out/vendors.xlsx", "/tmp/acct.xlsx"]
        );
        assert!(parse_output_paths("nothing useful").is_empty());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            LedgerAutomation::vendors(vendors(&[])).unwrap_err().to_string(),
            "No vendors provided"
        );
        assert_eq!(
            LedgerAutomation::accounts(LedgerRequest::default())
                .unwrap_err()
                .to_string(),
            "No accounts provided"
        );
        let request = LedgerRequest {
            accounts: Some(vec![AccountRequest {
                code: Some("1000".to_string()),
                start_date: Some("2025-01-01".to_string()),
                end_date: None,
            }]),
            ..Default::default()
        };
        assert_eq!(
            LedgerAutomation::accounts(request).unwrap_err().to_string(),
            "Invalid account data: missing required fields"
        );
    }

    #[test]
    fn test_script_config_shape() {
        let automation = LedgerAutomation::vendors(vendors(&["Acme"])).unwrap();
        let config = automation.script_config();
        assert_eq!(config["type"], "vendors");
        assert_eq!(config["vendors"][0], "Acme");
        assert_eq!(config["showBrowser"], false);
        assert_eq!(automation.info().job_prefix, "vendor_job");
    }

    #[tokio::test]
    async fn test_prepare_writes_config() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let automation = LedgerAutomation::vendors(vendors(&["Acme"])).unwrap();
        let prepared = automation
            .prepare(&ctx, &JobId::from("vendor_job_1"))
            .await
            .unwrap();

        assert_eq!(prepared.scratch.len(), 1);
        let written: Value =
            serde_json::from_slice(&std::fs::read(&prepared.scratch[0]).unwrap()).unwrap();
        assert_eq!(written["vendors"][0], "Acme");
        assert_eq!(prepared.spec.args.last().map(String::as_str), Some("--headless"));
        assert_eq!(
            prepared.spec.cwd.as_deref(),
            Some(dir.path().join("automation_scripts/jonas").as_path())
        );
    }

    #[tokio::test]
    async fn test_collect_moves_announced_reports() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let script_dir = dir.path().join("automation_scripts/jonas");
        std::fs::create_dir_all(script_dir.join("out")).unwrap();
        std::fs::create_dir_all(dir.path().join("downloads/jonas")).unwrap();
        std::fs::write(script_dir.join("out/report.html"), "<p/>").unwrap();

        let outcome = ProcessOutcome {
            reason: ExitReason::Exited(Some(0)),
            stdout: "SUCCESS: Saved HTML file to: out/report.html\n".to_string(),
            stderr: String::new(),
        };
        let automation = LedgerAutomation::vendors(vendors(&["Acme"])).unwrap();
        let collected = automation
            .collect(&ctx, &JobId::from("vendor_job_9"), &outcome)
            .await
            .unwrap();

        assert_eq!(collected.files.len(), 1);
        assert_eq!(collected.files[0].file_name, "vendor_job_9_report.html");
        assert!(!script_dir.join("out/report.html").exists());
        assert_eq!(
            collected.message,
            "AM Automation completed successfully! 1 file(s) ready for download."
        );
    }

    #[tokio::test]
    async fn test_demo_accounts_single_file() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let request = LedgerRequest {
            accounts: Some(vec![AccountRequest {
                code: Some("1000".to_string()),
                start_date: Some("2025-01-01".to_string()),
                end_date: Some("2025-01-31".to_string()),
            }]),
            ..Default::default()
        };
        let automation = LedgerAutomation::accounts(request).unwrap();
        let collected = automation
            .demo(&ctx, &JobId::from("account_job_3"))
            .await
            .unwrap();
        assert_eq!(collected.files.len(), 1);
        assert_eq!(collected.files[0].file_name, "account_job_3_account_output.html");
        assert_eq!(
            collected.files[0].download_url,
            "/jobs/jonas/download?jobId=account_job_3&fileName=account_job_3_account_output.html"
        );
    }
}
