//! The run controller: one bounded, paced pass over a platform's queue.
//!
//! Items are attempted strictly in queue order, one at a time. Each outcome
//! is committed to disk before the next submission, so interrupting a run
//! loses at most the in-flight attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classify::{classify, Classification};
use crate::config::{ConfigError, RunSettings};
use crate::content::{ContentItem, Platform, PlatformStatus};
use crate::publisher::{Publisher, Submission};
use crate::store::{Ledger, StorageError};
use crate::transform::{inject_footer, normalize_tags};

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of timestamps and the pacing delay.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current time, recorded on archived items.
    fn now(&self) -> DateTime<Utc>;

    /// Wait for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `chrono` and `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The per-run success cap was reached.
    CapReached,
    /// No eligible items remain.
    QueueDrained,
    /// The platform signalled back-pressure; the head item stays queued.
    BackPressure {
        /// Diagnostic text.
        reason: String,
    },
    /// The queue file does not exist.
    NoQueue,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapReached => f.write_str("per-run cap reached"),
            Self::QueueDrained => f.write_str("queue drained"),
            Self::BackPressure { reason } => write!(f, "stopped on back-pressure: {reason}"),
            Self::NoQueue => f.write_str("no queue file"),
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Target platform.
    pub platform: Platform,
    /// Newly archived as published (including reconciled collisions).
    pub published: usize,
    /// Newly archived as failed.
    pub failed: usize,
    /// Items still in the queue.
    pub remaining: usize,
    /// Why the run ended.
    pub stop: StopReason,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: published {}, failed {}, {} pending ({})",
            self.platform.label(),
            self.published,
            self.failed,
            self.remaining,
            self.stop
        )
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Drives one run against one platform.
pub struct RunController {
    settings: RunSettings,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
}

impl RunController {
    /// Create a controller.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the publisher targets a
    /// different platform than `settings`.
    pub fn new(
        settings: RunSettings,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if publisher.platform() != settings.platform {
            return Err(ConfigError::InvalidValue {
                field: "platform",
                reason: format!(
                    "publisher targets {} but settings target {}",
                    publisher.platform(),
                    settings.platform
                ),
            });
        }
        Ok(Self {
            settings,
            publisher,
            clock,
        })
    }

    /// Open the configured queue and archive and run.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if either file is malformed (before anything
    /// is submitted) or a transition cannot be persisted.
    pub async fn run(&self) -> Result<RunReport, StorageError> {
        let mut ledger = Ledger::open(
            self.settings.platform,
            &self.settings.queue_path,
            &self.settings.archive_path,
        )?;
        self.run_with(&mut ledger).await
    }

    /// Run against an already opened ledger.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if a transition cannot be persisted.
    pub async fn run_with(&self, ledger: &mut Ledger) -> Result<RunReport, StorageError> {
        let platform = self.settings.platform;
        let cap = usize::try_from(self.settings.max_per_run).unwrap_or(usize::MAX);
        let mut published = 0_usize;
        let mut failed = 0_usize;

        if !ledger.has_queue() {
            info!(
                platform = %platform,
                queue = %self.settings.queue_path.display(),
                "no queue file, nothing to do"
            );
            return Ok(report(platform, ledger, 0, 0, StopReason::NoQueue));
        }

        let terminal_in_queue = ledger
            .queue()
            .iter()
            .filter(|item| item.status(platform).is_terminal())
            .count();
        if terminal_in_queue > 0 {
            warn!(
                platform = %platform,
                count = terminal_in_queue,
                "queue holds items already marked terminal; skipping them"
            );
        }

        let mut cursor = 0_usize;
        let stop = loop {
            if published >= cap {
                break StopReason::CapReached;
            }
            let Some(index) = next_eligible(ledger.queue(), platform, cursor) else {
                break StopReason::QueueDrained;
            };
            cursor = index;
            let item = ledger.queue()[index].clone();

            if ledger.is_archived(&item) {
                warn!(
                    platform = %platform,
                    title = %item.title(),
                    key = %item.key(),
                    "already archived, dropping stale queue entry without resubmitting"
                );
                ledger.remove_at(index)?;
                continue;
            }

            let submission = self.prepare(&item);
            info!(
                platform = %platform,
                title = %item.title(),
                tags = ?submission.tags,
                "submitting"
            );
            let outcome = self.publisher.submit(&submission).await;
            let rule = self.publisher.collision_rule();
            let classification = classify(&outcome, item.canonical_url(), rule.as_ref());
            debug!(platform = %platform, raw = ?outcome, "submission outcome");

            match classification {
                Classification::Published { url, reconciled } => {
                    let entry = item.published(platform, url.clone(), self.clock.now());
                    ledger.archive_at(index, entry)?;
                    published = published.saturating_add(1);
                    if reconciled {
                        info!(
                            platform = %platform,
                            title = %item.title(),
                            url = %url,
                            "canonical URL already registered, archived as published"
                        );
                    } else {
                        info!(platform = %platform, title = %item.title(), url = %url, "published");
                    }

                    let more_allowed = published < cap;
                    let more_queued = next_eligible(ledger.queue(), platform, cursor).is_some();
                    let pacing = self.settings.pacing;
                    if more_allowed && more_queued && !pacing.is_zero() {
                        debug!(
                            platform = %platform,
                            secs = pacing.as_secs(),
                            "pacing before next submission"
                        );
                        self.clock.sleep(pacing).await;
                    }
                }
                Classification::PermanentFailure { reason } => {
                    warn!(
                        platform = %platform,
                        title = %item.title(),
                        reason = %reason,
                        "permanent failure, archived for manual follow-up"
                    );
                    let entry = item.failed(platform, reason, self.clock.now());
                    ledger.archive_at(index, entry)?;
                    failed = failed.saturating_add(1);
                }
                Classification::RetryableFailure { reason } => {
                    warn!(
                        platform = %platform,
                        title = %item.title(),
                        reason = %reason,
                        "retryable failure, ending run"
                    );
                    break StopReason::BackPressure { reason };
                }
            }
        };

        let summary = report(platform, ledger, published, failed, stop);
        info!(
            platform = %platform,
            published = summary.published,
            failed = summary.failed,
            remaining = summary.remaining,
            stop = %summary.stop,
            "run complete"
        );
        Ok(summary)
    }

    /// Apply tag normalization and footer injection.
    fn prepare(&self, item: &ContentItem) -> Submission {
        let body = match &self.settings.footer {
            Some(footer) => inject_footer(item.body(), footer),
            None => item.body().to_owned(),
        };
        Submission {
            title: item.title().to_owned(),
            body,
            canonical_url: item.canonical_url().map(str::to_owned),
            tags: normalize_tags(item.tags(), &self.settings.tag_policy),
            series: item.series().map(str::to_owned),
        }
    }
}

fn report(
    platform: Platform,
    ledger: &Ledger,
    published: usize,
    failed: usize,
    stop: StopReason,
) -> RunReport {
    RunReport {
        platform,
        published,
        failed,
        remaining: ledger.queue().len(),
        stop,
    }
}

/// First pending item at or after `from`.
fn next_eligible(queue: &[ContentItem], platform: Platform, from: usize) -> Option<usize> {
    queue
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, item)| item.status(platform) == PlatformStatus::Pending)
        .map(|(index, _)| index)
}
