//! One-off vendor lookup with a hard timeout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::process::interpreter::Interpreter;
use crate::process::invoker::run_with_timeout;

/// Runs `vendor_search.py <name>` and interprets its verdict.
pub struct VendorLookup {
    interpreter: Arc<Interpreter>,
    script: PathBuf,
    timeout: Duration,
}

impl VendorLookup {
    pub fn new(interpreter: Arc<Interpreter>, script: PathBuf, timeout: Duration) -> Self {
        Self {
            interpreter,
            script,
            timeout,
        }
    }

    pub fn from_config(config: &Config, interpreter: Arc<Interpreter>) -> Self {
        let script = config
            .paths
            .root()
            .join("playwright")
            .join("jonas")
            .join("vendor_search.py");
        Self::new(interpreter, script, config.jobs.lookup_timeout())
    }

    /// True only for exit 0 with `found` or `true` in stdout.
    ///
    /// Timeouts, spawn failures and non-zero exits all count as not found.
    pub async fn search(&self, vendor_name: &str) -> bool {
        let spec = self.interpreter.script(&self.script).arg(vendor_name);

        match run_with_timeout(&spec, self.timeout).await {
            Ok(Some(outcome)) if outcome.success() => {
                let verdict = outcome.stdout.trim().to_lowercase();
                verdict.contains("found") || verdict.contains("true")
            }
            Ok(Some(outcome)) => {
                log::error!("Vendor search error: {}", outcome.error_text());
                false
            }
            Ok(None) => {
                log::error!(
                    "Vendor search timed out after {}s",
                    self.timeout.as_secs()
                );
                false
            }
            Err(e) => {
                log::error!("Failed to start vendor search process: {}", e);
                false
            }
        }
    }
}
