use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalJobsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process error: {0}")]
    Invoke(#[from] InvokeError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("File resolution error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Automation error: {0}")]
    Automation(#[from] AutomationError),

    #[error("Poll error: {0}")]
    Poll(#[from] PollError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process output stream unavailable")]
    MissingPipe,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Job registry is full ({capacity} active jobs)")]
    Full { capacity: usize },

    #[error("Job not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{0}")]
    MissingParameter(&'static str),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Only HTML files can be previewed")]
    NotPreviewable,

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to prepare automation run: {0}")]
    Prepare(String),

    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Status request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Status endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Gave up after {0} polls")]
    Exhausted(u32),
}

pub type Result<T> = std::result::Result<T, PortalJobsError>;
