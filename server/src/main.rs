//! `portaljobs` binary: the HTTP server and a terminal status watcher.

mod error;
mod routes;
mod state;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use portaljobs::config::{load_config, resolve_config_path, Config};
use portaljobs::job::{spawn_sweeper, SweeperConfig};
use portaljobs::poller::{HttpStatusSource, StatusPoller};
use portaljobs::status::StatusFamily;
use portaljobs::telemetry;

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "portaljobs")]
#[command(about = "Runs portal automation jobs and serves their results", long_about = None)]
struct Cli {
    /// Config file (falls back to $PORTALJOBS_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve {
        /// Listen address, overrides `server.bind`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Follow a job on a running server until it finishes
    Watch {
        #[arg(long, value_enum)]
        family: Family,
        #[arg(long)]
        job_id: String,
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
        /// Give up after this many polls
        #[arg(long)]
        max_polls: Option<u32>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Family {
    Amos,
    Wpr,
    Jonas,
}

impl From<Family> for StatusFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Amos => StatusFamily::Solar,
            Family::Wpr => StatusFamily::WeeklyReport,
            Family::Jonas => StatusFamily::Ledger,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config_path(cli.config.as_deref()) {
        Some(path) => match load_config(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    telemetry::init(&config.logging);

    let result = match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Watch {
            family,
            job_id,
            server,
            max_polls,
        } => watch(&config, family.into(), &job_id, &server, max_polls).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: Config, bind: Option<String>) -> Result<(), String> {
    info!("Starting portaljobs v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let state = AppState::new(&config, shutdown.clone());
    let sweeper = spawn_sweeper(
        state.registry.clone(),
        SweeperConfig::from_config(&config),
    );

    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind {}: {}", addr, e))?;
    info!("Listening on http://{}", addr);

    let signal = {
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
            shutdown.cancel();
        }
    };

    let served = axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(signal)
        .await;

    sweeper.cancel();
    served.map_err(|e| format!("Server error: {}", e))
}

async fn watch(
    config: &Config,
    family: StatusFamily,
    job_id: &str,
    server: &str,
    max_polls: Option<u32>,
) -> Result<(), String> {
    let mut poller = StatusPoller::new(config.jobs.poll_interval());
    if let Some(max) = max_polls {
        poller = poller.with_max_polls(max);
    }
    let source = HttpStatusSource::new(server);

    let done = poller
        .poll(&source, family, job_id, |progress, message| {
            info!("[{}] {:>3}% {}", job_id, progress, message);
        })
        .await
        .map_err(|e| format!("Job {}: {}", job_id, e))?;

    info!(
        "Job {} completed: {} file(s), {} record(s)",
        job_id,
        done.files.len(),
        done.record_count
    );
    if let Some(url) = done.download_url {
        info!("Download: {}{}", server.trim_end_matches('/'), url);
    }
    Ok(())
}
