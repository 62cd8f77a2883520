//! Background task expiring finished jobs and stale generated files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::files::cleanup::remove_older_than;
use crate::job::registry::JobRegistry;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Interval between sweeps (default: 60 seconds).
    pub interval: Duration,
    /// Directory and maximum age for generated-file retention.
    pub retention: Option<(PathBuf, Duration)>,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            retention: None,
        }
    }
}

impl SweeperConfig {
    pub fn from_config(config: &Config) -> Self {
        let retention = config.files.retention_hours.map(|hours| {
            (
                config.paths.downloads().join("jonas"),
                Duration::from_secs(hours * 3600),
            )
        });
        Self {
            interval: Duration::from_secs(config.jobs.sweep_interval_secs.max(1)),
            retention,
        }
    }
}

/// Spawns the sweeper. Cancel the returned token to stop it.
pub fn spawn_sweeper(registry: Arc<JobRegistry>, config: SweeperConfig) -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    tokio::spawn(async move {
        run_sweep_loop(registry, config, cancel_clone).await;
    });

    cancel
}

async fn run_sweep_loop(
    registry: Arc<JobRegistry>,
    config: SweeperConfig,
    cancel: CancellationToken,
) {
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!(
        interval_secs = config.interval.as_secs(),
        retention = config.retention.is_some(),
        "Job sweeper started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Job sweeper shutting down");
                break;
            }
            _ = ticker.tick() => {
                sweep_once(&registry, &config).await;
            }
        }
    }
}

/// Runs one sweep: registry TTL expiry, then file retention.
pub async fn sweep_once(registry: &JobRegistry, config: &SweeperConfig) -> usize {
    let expired = registry.sweep(Utc::now());
    if expired > 0 {
        info!(expired, remaining = registry.len(), "Expired finished jobs");
    } else {
        debug!("Job sweep: nothing expired");
    }

    if let Some((dir, max_age)) = &config.retention {
        match remove_older_than(dir, *max_age).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, dir = %dir.display(), "Removed stale output files"),
            Err(e) => warn!(error = %e, dir = %dir.display(), "Output retention sweep failed"),
        }
    }

    expired
}
