pub mod pool;

pub use pool::{WorkerPermit, WorkerPool};
