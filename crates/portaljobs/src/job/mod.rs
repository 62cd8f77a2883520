pub mod record;
pub mod registry;
pub mod sweeper;

pub use record::{parse_timestamp_millis, FileDescriptor, JobId, JobMode, JobRecord, JobStatus};
pub use registry::JobRegistry;
pub use sweeper::{spawn_sweeper, sweep_once, SweeperConfig};
