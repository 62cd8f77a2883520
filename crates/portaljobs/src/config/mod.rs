pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, resolve_config_path};
pub use schema::{
    Config, DemoConfig, FilesConfig, JobsConfig, LoggingConfig, PathsConfig, PythonConfig,
    ServerConfig,
};
