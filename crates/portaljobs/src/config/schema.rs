use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            server: ServerConfig::default(),
            paths: PathsConfig::default(),
            python: PythonConfig::default(),
            jobs: JobsConfig::default(),
            demo: DemoConfig::default(),
            files: FilesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Builds a default config rooted at `project_root`.
    pub fn with_root<P: AsRef<Path>>(project_root: P) -> Self {
        let mut config = Self::default();
        config.paths.project_root = project_root.as_ref().to_string_lossy().to_string();
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Directory layout. Relative paths are resolved against `project_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_project_root")]
    pub project_root: String,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: String,
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,
    #[serde(default = "default_site_data_dir")]
    pub site_data_dir: String,
}

fn default_project_root() -> String {
    ".".to_string()
}

fn default_downloads_dir() -> String {
    "downloads".to_string()
}

fn default_scripts_dir() -> String {
    "automation_scripts".to_string()
}

fn default_site_data_dir() -> String {
    "app/services/data".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            downloads_dir: default_downloads_dir(),
            scripts_dir: default_scripts_dir(),
            site_data_dir: default_site_data_dir(),
        }
    }
}

impl PathsConfig {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.project_root)
    }

    fn under_root(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        }
    }

    pub fn downloads(&self) -> PathBuf {
        self.under_root(&self.downloads_dir)
    }

    pub fn scripts(&self) -> PathBuf {
        self.under_root(&self.scripts_dir)
    }

    pub fn site_data(&self) -> PathBuf {
        self.under_root(&self.site_data_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    /// Explicit interpreter path; skips virtual environment discovery.
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default = "default_venv_dirs")]
    pub venv_dirs: Vec<String>,
    #[serde(default)]
    pub warmup_script: Option<String>,
}

fn default_venv_dirs() -> Vec<String> {
    vec![".venv".to_string(), "venv".to_string()]
}

impl Default for PythonConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            venv_dirs: default_venv_dirs(),
            warmup_script: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_processes: usize,
    #[serde(default)]
    pub process_timeout_secs: Option<u64>,
    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_capacity() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    num_cpus::get()
}

fn default_lookup_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_concurrent_processes: default_max_concurrent(),
            process_timeout_secs: None,
            lookup_timeout_secs: default_lookup_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl JobsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Delays of the three demo transitions (30%, 60%, completed).
    #[serde(default = "default_schedule_ms")]
    pub schedule_ms: Vec<u64>,
    /// Skip availability checks and always run in demo mode.
    #[serde(default)]
    pub force: bool,
}

fn default_schedule_ms() -> Vec<u64> {
    vec![2000, 5000, 8000]
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            schedule_ms: default_schedule_ms(),
            force: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_true")]
    pub synthetic_fallback: bool,
    #[serde(default)]
    pub retention_hours: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            synthetic_fallback: true,
            retention_hours: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_resolve_against_root() {
        let config = Config::with_root("/srv/dashboard");
        assert_eq!(
            config.paths.downloads(),
            PathBuf::from("/srv/dashboard/downloads")
        );
        assert_eq!(
            config.paths.scripts(),
            PathBuf::from("/srv/dashboard/automation_scripts")
        );
    }

    #[test]
    fn test_absolute_paths_kept() {
        let mut config = Config::with_root("/srv/dashboard");
        config.paths.downloads_dir = "/var/lib/downloads".to_string();
        assert_eq!(config.paths.downloads(), PathBuf::from("/var/lib/downloads"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.demo.schedule_ms, vec![2000, 5000, 8000]);
        assert_eq!(config.jobs.lookup_timeout(), Duration::from_secs(30));
        assert!(config.jobs.process_timeout().is_none());
        assert!(config.files.synthetic_fallback);
    }
}
