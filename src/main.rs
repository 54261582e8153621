//! Syndicate CLI entry point.
//!
//! Provides `run`, `status`, and `enqueue` subcommands for draining a
//! platform queue, reporting queue/archive counts, or importing items.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, warn};

use syndicate::app::{self, SyndicateError};
use syndicate::config::{Config, RunOverrides};
use syndicate::content::Platform;
use syndicate::credentials::load_credentials;
use syndicate::logging::{self, LoggingGuard};

/// Publish queued content to Dev.to and Hashnode.
#[derive(Parser)]
#[command(name = "syndicate", version, about)]
struct Cli {
    /// Configuration file (default: `$SYNDICATE_CONFIG` or `./syndicate.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Credentials file (default: `./.env` when present).
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    /// Also write JSON logs to this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Publish up to the per-run cap from one platform's queue.
    Run {
        /// Target platform (`devto` or `hashnode`).
        platform: Platform,
        /// Maximum successful publishes this run.
        #[arg(long)]
        max: Option<u32>,
        /// Seconds to wait between successful publishes.
        #[arg(long)]
        pacing_secs: Option<u64>,
        /// Queue file override.
        #[arg(long)]
        queue: Option<PathBuf>,
        /// Archive file override.
        #[arg(long)]
        archive: Option<PathBuf>,
    },
    /// Show pending, published, and failed counts.
    Status {
        /// Limit to one platform.
        platform: Option<Platform>,
    },
    /// Import items from a JSON array into platform queues.
    Enqueue {
        /// File holding the items to import.
        file: PathBuf,
        /// Target platform; repeat for several (default: all).
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging(&cli);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "syndicate failed");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_logging(cli: &Cli) -> Option<LoggingGuard> {
    let Some(dir) = cli.log_dir.as_deref() else {
        logging::init_cli();
        return None;
    };
    match logging::init_production(dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_cli();
            warn!(error = %e, "file logging unavailable, logging to stderr only");
            None
        }
    }
}

async fn execute(cli: Cli) -> Result<(), SyndicateError> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            platform,
            max,
            pacing_secs,
            queue,
            archive,
        } => {
            let credentials = load_credentials(cli.env_file.as_deref())?;
            let overrides = RunOverrides {
                max_per_run: max,
                pacing_secs,
                queue,
                archive,
            };
            let report = app::run_platform(&config, &credentials, platform, &overrides).await?;
            println!("{report}");
        }
        Command::Status { platform } => {
            let platforms = platform.map_or_else(|| Platform::ALL.to_vec(), |p| vec![p]);
            for (platform, summary) in app::status(&config, &platforms)? {
                println!(
                    "{}: {} pending, {} published, {} failed",
                    platform.label(),
                    summary.pending,
                    summary.published,
                    summary.failed
                );
            }
        }
        Command::Enqueue { file, platforms } => {
            let platforms = if platforms.is_empty() {
                Platform::ALL.to_vec()
            } else {
                platforms
            };
            for (platform, report) in app::enqueue(&config, &file, &platforms)? {
                println!(
                    "{}: queued {}, archived {}, skipped {}",
                    platform.label(),
                    report.queued,
                    report.archived,
                    report.skipped
                );
            }
        }
    }
    Ok(())
}
