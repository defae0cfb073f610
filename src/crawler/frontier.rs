//! Crawl frontier shared by all workers
//!
//! This module handles:
//! - Priority queue of pages still to visit (navigation before item pages)
//! - Once-per-run URL admission (membership check and insert in one critical section)
//! - Same-host scoping
//! - Completion detection: empty queue and nothing in flight
//! - Waking idle workers on new work or shutdown

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use url::Url;

use crate::url::same_host;

/// Why a page was queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontierKind {
    /// A category listing linked from the sidebar
    CategoryIndex,

    /// A single item's detail page
    ItemPage,

    /// The "next" link of a paginated listing
    PaginationNext,
}

impl FrontierKind {
    /// Returns true for listing pages (category indexes and their pagination)
    pub fn is_navigation(self) -> bool {
        !matches!(self, Self::ItemPage)
    }

    // Lower is served first
    fn priority(self) -> u8 {
        if self.is_navigation() {
            0
        } else {
            1
        }
    }
}

/// A URL queued for fetching together with its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub kind: FrontierKind,
}

impl FrontierEntry {
    pub fn new(url: Url, kind: FrontierKind) -> Self {
        Self { url, kind }
    }
}

/// Heap slot; `seq` keeps FIFO order within a priority
#[derive(Debug)]
struct Queued {
    entry: FrontierEntry,
    seq: u64,
}

// BinaryHeap is a max-heap: reverse both keys so the lowest priority value
// and then the oldest sequence number pop first
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .entry
            .kind
            .priority()
            .cmp(&self.entry.kind.priority())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Queued {}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: BinaryHeap<Queued>,
    seen: HashSet<String>,
    in_flight: usize,
    next_seq: u64,
    shutdown: bool,
}

/// Thread-safe crawl frontier
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    notify: Notify,
    scope: Option<Url>,
}

impl Frontier {
    /// Creates an unscoped frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier that only admits URLs on the host of `start`
    pub fn scoped_to(start: &Url) -> Self {
        Self {
            scope: Some(start.clone()),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn in_scope(&self, url: &Url) -> bool {
        match &self.scope {
            Some(scope) => same_host(scope, url),
            None => true,
        }
    }

    /// Queues entries whose URL has not been seen this run
    ///
    /// Returns the number of entries accepted. Nothing is accepted after
    /// shutdown.
    pub fn enqueue<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = FrontierEntry>,
    {
        let mut accepted = 0;
        {
            let mut inner = self.lock();
            if inner.shutdown {
                return 0;
            }

            for entry in entries {
                if !self.in_scope(&entry.url) {
                    tracing::trace!("Out of scope, not queued: {}", entry.url);
                    continue;
                }
                if !inner.seen.insert(entry.url.as_str().to_string()) {
                    continue;
                }

                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.queue.push(Queued { entry, seq });
                accepted += 1;
            }
        }

        if accepted > 0 {
            self.notify.notify_waiters();
        }
        accepted
    }

    /// Takes the next entry, waiting while other workers may still add work
    ///
    /// Returns `None` once the frontier is shut down, or when the queue is
    /// empty and no entry is in flight. Every entry returned must be
    /// followed by a call to [`Frontier::complete`].
    pub async fn next(&self) -> Option<FrontierEntry> {
        loop {
            // Registered before the check so a wakeup between check and await is not lost
            let notified = self.notify.notified();

            {
                let mut inner = self.lock();
                if inner.shutdown {
                    return None;
                }
                if let Some(queued) = inner.queue.pop() {
                    inner.in_flight += 1;
                    return Some(queued.entry);
                }
                if inner.in_flight == 0 {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks one dequeued entry as fully processed
    pub fn complete(&self) {
        let idle = {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
            inner.in_flight == 0 && inner.queue.is_empty()
        };

        if idle {
            self.notify.notify_waiters();
        }
    }

    /// Stops all further dequeues and wakes waiting workers
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries handed out and not yet completed
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }
}
