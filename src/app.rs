//! Top-level operations behind the CLI subcommands.
//!
//! Each returns a [`SyndicateError`] rather than exiting; `main` maps the
//! error to a process exit status.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::{Config, ConfigError, RunOverrides};
use crate::content::Platform;
use crate::credentials::Credentials;
use crate::publisher::{for_platform, Publisher};
use crate::run::{RunController, RunReport, SystemClock};
use crate::store::{self, EnqueueReport, Ledger, LedgerSummary, StorageError};

/// Fatal errors surfaced to the operator.
#[derive(Debug, thiserror::Error)]
pub enum SyndicateError {
    /// Configuration or credentials are unusable; nothing was touched.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Queue or archive could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SyndicateError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Storage(_) => 3,
        }
    }
}

/// Run one bounded publish pass for `platform`.
///
/// Settings and credentials are resolved before any file is opened.
///
/// # Errors
///
/// Returns [`SyndicateError::Config`] for missing credentials or invalid
/// settings and [`SyndicateError::Storage`] for malformed or unwritable files.
pub async fn run_platform(
    config: &Config,
    credentials: &Credentials,
    platform: Platform,
    overrides: &RunOverrides,
) -> Result<RunReport, SyndicateError> {
    let settings = config.settings(platform, overrides)?;
    let publisher: Arc<dyn Publisher> = Arc::from(for_platform(&settings, credentials)?);

    info!(
        platform = %platform,
        max_per_run = settings.max_per_run,
        pacing_secs = settings.pacing.as_secs(),
        queue = %settings.queue_path.display(),
        "starting run"
    );

    let controller = RunController::new(settings, publisher, Arc::new(SystemClock))?;
    Ok(controller.run().await?)
}

/// Queue/archive counts for each platform.
///
/// # Errors
///
/// Returns [`SyndicateError::Storage`] if a file is malformed.
pub fn status(
    config: &Config,
    platforms: &[Platform],
) -> Result<Vec<(Platform, LedgerSummary)>, SyndicateError> {
    platforms
        .iter()
        .map(|&platform| -> Result<_, SyndicateError> {
            let (queue, archive) = config.storage_paths(platform);
            let ledger = Ledger::open(platform, queue, archive)?;
            Ok((platform, ledger.summary()))
        })
        .collect()
}

/// Add the items in `source` (a JSON array of item records) to each
/// platform's queue.
///
/// Every target ledger is loaded before any is written, so a malformed file
/// aborts the import without partial changes.
///
/// # Errors
///
/// Returns [`SyndicateError::Storage`] if the source or a target file is
/// missing, malformed or unwritable.
pub fn enqueue(
    config: &Config,
    source: &Path,
    platforms: &[Platform],
) -> Result<Vec<(Platform, EnqueueReport)>, SyndicateError> {
    let items = store::load_queue(source)?.ok_or_else(|| StorageError::Read {
        path: source.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "import file does not exist"),
    })?;

    let mut ledgers = platforms
        .iter()
        .map(|&platform| {
            let (queue, archive) = config.storage_paths(platform);
            Ledger::open(platform, queue, archive)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut reports = Vec::with_capacity(ledgers.len());
    for ledger in &mut ledgers {
        let report = ledger.enqueue(items.clone())?;
        info!(
            platform = %ledger.platform(),
            queued = report.queued,
            archived = report.archived,
            skipped = report.skipped,
            "import complete"
        );
        reports.push((ledger.platform(), report));
    }
    Ok(reports)
}
