//! Queue and archive persistence.
//!
//! Each platform has two JSON files: the queue (pending items, FIFO) and the
//! archive (terminal items, append-only). Files are rewritten in full after
//! every transition using a temp-file-and-rename so a crash never leaves a
//! truncated document behind.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::content::{ContentItem, Platform, PlatformStatus};

/// Queue/archive persistence failures. Always fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// File is not a JSON array.
    #[error("{} is not a JSON array of item records: {source}", path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// One record failed validation.
    #[error("{} record #{index}: {reason}", path.display())]
    InvalidRecord {
        /// File path.
        path: PathBuf,
        /// Zero-based record index.
        index: usize,
        /// Validation failure.
        reason: String,
    },
    /// File could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

fn load_items(path: &Path) -> Result<Option<Vec<ContentItem>>, StorageError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let records: Vec<Value> =
        serde_json::from_str(&contents).map_err(|source| StorageError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value(record).map_err(|e| StorageError::InvalidRecord {
                path: path.to_path_buf(),
                index,
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Load a queue. `Ok(None)` means the file does not exist.
///
/// # Errors
///
/// Returns [`StorageError`] if the file exists but is unreadable or malformed.
pub fn load_queue(path: &Path) -> Result<Option<Vec<ContentItem>>, StorageError> {
    load_items(path)
}

/// Load an archive; a missing file is an empty archive.
///
/// # Errors
///
/// Returns [`StorageError`] if the file exists but is unreadable or malformed.
pub fn load_archive(path: &Path) -> Result<Vec<ContentItem>, StorageError> {
    Ok(load_items(path)?.unwrap_or_default())
}

/// Overwrite `path` with `items` as pretty-printed JSON, atomically.
///
/// # Errors
///
/// Returns [`StorageError::Write`] on any I/O failure; the previous file
/// contents are left intact in that case.
pub fn save(path: &Path, items: &[ContentItem]) -> Result<(), StorageError> {
    let write_error = |source: io::Error| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_error)?;

    let mut json = serde_json::to_string_pretty(items)
        .map_err(|e| write_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    json.push('\n');

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(json.as_bytes()).map_err(write_error)?;
    tmp.flush().map_err(write_error)?;
    tmp.as_file_mut().sync_all().map_err(write_error)?;
    tmp.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Counts for one platform's queue and archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    /// Items in the queue.
    pub pending: usize,
    /// Archived as published.
    pub published: usize,
    /// Archived as failed.
    pub failed: usize,
}

/// Result of adding items to a ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    /// Appended to the queue.
    pub queued: usize,
    /// Already terminal for the platform; appended to the archive.
    pub archived: usize,
    /// Identity already known to the platform; ignored.
    pub skipped: usize,
}

/// One platform's queue and archive, persisted after every change.
#[derive(Debug)]
pub struct Ledger {
    platform: Platform,
    queue_path: PathBuf,
    archive_path: PathBuf,
    queue: Vec<ContentItem>,
    archive: Vec<ContentItem>,
    queue_present: bool,
}

impl Ledger {
    /// Load both files. Nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if either file is unreadable or malformed.
    pub fn open(
        platform: Platform,
        queue_path: impl Into<PathBuf>,
        archive_path: impl Into<PathBuf>,
    ) -> Result<Self, StorageError> {
        let queue_path = queue_path.into();
        let archive_path = archive_path.into();
        let queue = load_queue(&queue_path)?;
        let archive = load_archive(&archive_path)?;
        Ok(Self {
            platform,
            queue_present: queue.is_some(),
            queue: queue.unwrap_or_default(),
            archive,
            queue_path,
            archive_path,
        })
    }

    /// Platform this ledger belongs to.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Whether the queue file existed when opened (or has since been written).
    pub fn has_queue(&self) -> bool {
        self.queue_present
    }

    /// Pending items in submission order.
    pub fn queue(&self) -> &[ContentItem] {
        &self.queue
    }

    /// Terminal items in archive order.
    pub fn archive(&self) -> &[ContentItem] {
        &self.archive
    }

    /// Whether the archive already holds `item`.
    pub fn is_archived(&self, item: &ContentItem) -> bool {
        self.archive.iter().any(|entry| entry.same_item(item))
    }

    /// Move the queue item at `index` to the archive as `entry`.
    ///
    /// The archive is written before the queue: a crash in between leaves
    /// the item in both files, never in neither.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if either file cannot be saved.
    pub fn archive_at(&mut self, index: usize, entry: ContentItem) -> Result<(), StorageError> {
        self.archive.push(entry);
        if let Err(e) = save(&self.archive_path, &self.archive) {
            self.archive.pop();
            return Err(e);
        }
        self.remove_at(index).map(|_| ())
    }

    /// Drop the queue item at `index` without archiving it.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the queue cannot be saved.
    pub fn remove_at(&mut self, index: usize) -> Result<ContentItem, StorageError> {
        let removed = self.queue.remove(index);
        if let Err(e) = save(&self.queue_path, &self.queue) {
            self.queue.insert(index, removed);
            return Err(e);
        }
        self.queue_present = true;
        Ok(removed)
    }

    /// Add items, routing each by its recorded status for this platform.
    ///
    /// Pending items are appended to the queue and terminal ones to the
    /// archive. Items already in the queue or archive (or earlier in
    /// `items`) are skipped; see [`ContentItem::same_item`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if a file cannot be saved.
    pub fn enqueue(&mut self, items: Vec<ContentItem>) -> Result<EnqueueReport, StorageError> {
        let mut report = EnqueueReport::default();
        let mut archive_changed = false;

        for item in items {
            let known = self
                .queue
                .iter()
                .chain(self.archive.iter())
                .any(|entry| entry.same_item(&item));
            if known {
                report.skipped = report.skipped.saturating_add(1);
                continue;
            }
            if item.status(self.platform).is_terminal() {
                self.archive.push(item);
                archive_changed = true;
                report.archived = report.archived.saturating_add(1);
            } else {
                self.queue.push(item.queued_for(self.platform));
                report.queued = report.queued.saturating_add(1);
            }
        }

        if archive_changed {
            save(&self.archive_path, &self.archive)?;
        }
        if report.queued > 0 || !self.queue_present {
            save(&self.queue_path, &self.queue)?;
            self.queue_present = true;
        }
        Ok(report)
    }

    /// Pending / published / failed counts.
    pub fn summary(&self) -> LedgerSummary {
        let count = |status: PlatformStatus| {
            self.archive
                .iter()
                .filter(|item| item.status(self.platform) == status)
                .count()
        };
        LedgerSummary {
            pending: self.queue.len(),
            published: count(PlatformStatus::Published),
            failed: count(PlatformStatus::Failed),
        }
    }
}
