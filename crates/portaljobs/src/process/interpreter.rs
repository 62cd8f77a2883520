//! Locating the script interpreter.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;

use crate::config::Config;
use crate::process::invoker::{run_with_timeout, ProcessSpec};

const FALLBACK_INTERPRETER: &str = "python";
const CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const WARMUP_TIMEOUT: Duration = Duration::from_secs(300);

/// Interpreter used for all automation scripts.
#[derive(Debug)]
pub struct Interpreter {
    program: PathBuf,
    project_root: PathBuf,
    warmup_script: Option<PathBuf>,
    warmed_up: OnceCell<bool>,
}

impl Interpreter {
    pub fn new(program: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            project_root: project_root.into(),
            warmup_script: None,
            warmed_up: OnceCell::new(),
        }
    }

    /// Explicit override, else the first virtual environment found under the
    /// project root, else `python` from `PATH`.
    pub fn discover(config: &Config) -> Self {
        let root = config.paths.root();
        let program = match &config.python.interpreter {
            Some(explicit) => PathBuf::from(explicit),
            None => find_venv_python(&root, &config.python.venv_dirs)
                .unwrap_or_else(|| PathBuf::from(FALLBACK_INTERPRETER)),
        };
        log::info!("Using interpreter: {}", program.display());

        let warmup_script = config.python.warmup_script.as_ref().map(|script| {
            let path = Path::new(script);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            }
        });

        Self {
            program,
            project_root: root,
            warmup_script,
            warmed_up: OnceCell::new(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Whether the program resolves to an executable: bare names through
    /// `PATH`, relative paths against the project root.
    pub fn is_spawnable(&self) -> bool {
        let found =
            which::which_in(&self.program, std::env::var_os("PATH"), &self.project_root).is_ok();
        if !found {
            log::info!("Interpreter {} cannot be launched", self.program.display());
        }
        found
    }

    /// `interpreter script args...`, run from the project root.
    pub fn script(&self, script: &Path) -> ProcessSpec {
        ProcessSpec::new(&self.program)
            .arg(script.display().to_string())
            .cwd(&self.project_root)
    }

    /// True when `import m1; import m2; ...` succeeds and prints `OK`.
    pub async fn check_modules(&self, modules: &[&str]) -> bool {
        let imports: Vec<String> = modules.iter().map(|m| format!("import {}", m)).collect();
        let code = format!("{}; print('OK')", imports.join("; "));
        let spec = ProcessSpec::new(&self.program).arg("-c").arg(code);

        let started = Instant::now();
        let passed = match run_with_timeout(&spec, CHECK_TIMEOUT).await {
            Ok(Some(outcome)) => {
                let ok = outcome.success() && outcome.stdout.contains("OK");
                if !ok && !outcome.stderr.trim().is_empty() {
                    log::debug!("Dependency check stderr: {}", outcome.stderr.trim());
                }
                ok
            }
            Ok(None) => {
                log::warn!("Dependency check timed out");
                false
            }
            Err(e) => {
                log::info!("Interpreter unavailable: {}", e);
                false
            }
        };

        log::info!(
            "Dependency check {} in {}ms",
            if passed { "passed" } else { "failed" },
            started.elapsed().as_millis()
        );
        passed
    }

    /// Runs the configured warmup script once per process lifetime.
    ///
    /// Returns whether the warmup (now or earlier) succeeded.
    pub async fn warmup(&self) -> bool {
        let Some(script) = &self.warmup_script else {
            return false;
        };

        *self
            .warmed_up
            .get_or_init(|| async {
                let started = Instant::now();
                log::info!("Running interpreter warmup: {}", script.display());
                match run_with_timeout(&self.script(script), WARMUP_TIMEOUT).await {
                    Ok(Some(outcome)) if outcome.success() => {
                        log::info!(
                            "Interpreter warmup completed in {}ms",
                            started.elapsed().as_millis()
                        );
                        true
                    }
                    Ok(Some(outcome)) => {
                        log::warn!("Interpreter warmup failed: {:?}", outcome.reason);
                        false
                    }
                    Ok(None) => {
                        log::warn!("Interpreter warmup timed out");
                        false
                    }
                    Err(e) => {
                        log::warn!("Failed to start interpreter warmup: {}", e);
                        false
                    }
                }
            })
            .await
    }
}

fn find_venv_python(root: &Path, venv_dirs: &[String]) -> Option<PathBuf> {
    venv_dirs
        .iter()
        .flat_map(|dir| {
            let venv = root.join(dir);
            [
                venv.join("Scripts").join("python.exe"),
                venv.join("bin").join("python"),
            ]
        })
        .find(|candidate| candidate.is_file())
}
