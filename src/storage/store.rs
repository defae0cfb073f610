//! Dedup and resume store
//!
//! The store owns the seen-URL set and both output sinks. Admission and the
//! writes for an admitted record happen under one lock, so concurrent
//! workers can neither double-write a URL nor interleave lines.

use crate::output::ItemRecord;
use crate::storage::jsonl::{load_existing, JsonlSink};
use crate::storage::traits::{ItemSink, StorageResult};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// What happened to a submitted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New URL, written to both sinks
    Written,

    /// New URL, written to the primary sink; the mirror write failed
    MirrorFailed,

    /// New URL accepted without writing (dry run)
    Accepted,

    /// URL already seen in this run or a previous one
    Duplicate,

    /// The primary write failed; the URL was released
    WriteFailed,
}

impl RecordOutcome {
    /// True when the record reached the primary output (or would have, in a dry run)
    pub fn is_new(self) -> bool {
        matches!(self, Self::Written | Self::MirrorFailed | Self::Accepted)
    }
}

struct StoreInner {
    seen: HashSet<String>,
    primary: Option<Box<dyn ItemSink>>,
    mirror: Option<Box<dyn ItemSink>>,
}

/// Seen-URL set plus the primary and mirror sinks
pub struct ResumeStore {
    inner: Mutex<StoreInner>,
    preexisting: usize,
    skipped_lines: usize,
}

impl std::fmt::Debug for ResumeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeStore")
            .field("seen", &self.len())
            .field("preexisting", &self.preexisting)
            .finish()
    }
}

impl ResumeStore {
    /// Opens the store for a run
    ///
    /// Every URL in the primary output counts as seen. In a dry run the
    /// sinks are never opened, so nothing on disk is created or changed.
    pub fn open(primary: &Path, mirror: &Path, dry_run: bool) -> StorageResult<Self> {
        let existing = load_existing(primary)?;

        let (primary_sink, mirror_sink): (Option<Box<dyn ItemSink>>, Option<Box<dyn ItemSink>>) =
            if dry_run {
                tracing::info!("Dry run: output files will not be written");
                (None, None)
            } else {
                (
                    Some(Box::new(JsonlSink::open(primary)?)),
                    Some(Box::new(JsonlSink::open(mirror)?)),
                )
            };

        let preexisting = existing.urls.len();
        Ok(Self {
            inner: Mutex::new(StoreInner {
                seen: existing.urls,
                primary: primary_sink,
                mirror: mirror_sink,
            }),
            preexisting,
            skipped_lines: existing.skipped_lines,
        })
    }

    /// Builds a store over explicit sinks
    pub fn with_sinks(
        seen: HashSet<String>,
        primary: Box<dyn ItemSink>,
        mirror: Box<dyn ItemSink>,
    ) -> Self {
        let preexisting = seen.len();
        Self {
            inner: Mutex::new(StoreInner {
                seen,
                primary: Some(primary),
                mirror: Some(mirror),
            }),
            preexisting,
            skipped_lines: 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks the item's URL as seen; true only for the first caller
    pub fn accept(&self, item: &ItemRecord) -> bool {
        self.lock().seen.insert(item.url.clone())
    }

    /// Returns true if the URL is already collected
    pub fn contains(&self, url: &str) -> bool {
        self.lock().seen.contains(url)
    }

    /// Admits and writes a record
    ///
    /// A duplicate is not written. A failed primary write releases the URL
    /// and skips the mirror so the two files never disagree on a record
    /// the primary lacks.
    pub fn record(&self, item: &ItemRecord) -> RecordOutcome {
        let mut inner = self.lock();
        if !inner.seen.insert(item.url.clone()) {
            return RecordOutcome::Duplicate;
        }

        let StoreInner {
            seen,
            primary,
            mirror,
        } = &mut *inner;

        let primary = match primary {
            Some(primary) => primary,
            None => return RecordOutcome::Accepted,
        };

        if let Err(e) = primary.append(item) {
            tracing::error!(
                "Failed to write {} to {}: {}",
                item.url,
                primary.path().display(),
                e
            );
            seen.remove(&item.url);
            return RecordOutcome::WriteFailed;
        }

        if let Some(mirror) = mirror {
            if let Err(e) = mirror.append(item) {
                tracing::error!(
                    "Failed to mirror {} to {}: {}",
                    item.url,
                    mirror.path().display(),
                    e
                );
                return RecordOutcome::MirrorFailed;
            }
        }

        RecordOutcome::Written
    }

    /// Number of URLs seen, including those loaded at startup
    pub fn len(&self) -> usize {
        self.lock().seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// URLs that were already in the primary output at startup
    pub fn preexisting(&self) -> usize {
        self.preexisting
    }

    /// Unreadable lines skipped while loading the primary output
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }
}
