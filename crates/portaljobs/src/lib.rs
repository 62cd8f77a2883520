pub mod automation;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod files;
pub mod job;
pub mod poller;
pub mod process;
pub mod progress;
pub mod status;
pub mod telemetry;
pub mod worker;

pub use automation::{Automation, AutomationContext, JobRunner, Submission};
pub use broadcast::{JobProgressBroadcaster, JobProgressEvent};
pub use config::{load_config, Config};
pub use error::{
    AutomationError, ConfigError, InvokeError, PollError, PortalJobsError, RegistryError,
    ResolveError, Result,
};
pub use files::{FileResolver, ServedFile};
pub use job::{JobId, JobMode, JobRecord, JobRegistry, JobStatus};
pub use poller::{HttpStatusSource, StatusPoller, StatusSource};
pub use status::{StatusFamily, StatusResponse, StatusService};
