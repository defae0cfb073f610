//! Run counters and the end-of-run summary
//!
//! Workers bump the atomic counters in `CrawlStats` as they go; the
//! coordinator snapshots them into a `CrawlSummary` when the run ends.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared by all workers
#[derive(Debug, Default)]
pub struct CrawlStats {
    pages_fetched: AtomicU64,
    pages_skipped: AtomicU64,
    pages_failed: AtomicU64,
    pages_known: AtomicU64,
    items_dropped: AtomicU64,
    items_written: AtomicU64,
    duplicates: AtomicU64,
    write_failures: AtomicU64,
    mirror_failures: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $get:ident, $field:ident) => {
        pub fn $inc(&self, n: u64) {
            self.$field.fetch_add(n, Ordering::Relaxed);
        }

        pub fn $get(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(add_fetched, fetched, pages_fetched);
    counter!(add_skipped, skipped, pages_skipped);
    counter!(add_failed, failed, pages_failed);
    counter!(add_known, known, pages_known);
    counter!(add_dropped, dropped, items_dropped);
    counter!(add_written, written, items_written);
    counter!(add_duplicates, duplicates, duplicates);
    counter!(add_write_failures, write_failures, write_failures);
    counter!(add_mirror_failures, mirror_failures, mirror_failures);

    /// Freezes the counters into a summary
    pub fn summary(&self, elapsed: Duration, dry_run: bool) -> CrawlSummary {
        CrawlSummary {
            pages_fetched: self.fetched(),
            pages_skipped: self.skipped(),
            pages_failed: self.failed(),
            pages_already_collected: self.known(),
            items_dropped: self.dropped(),
            items_written: self.written(),
            duplicates: self.duplicates(),
            write_failures: self.write_failures(),
            mirror_failures: self.mirror_failures(),
            rate_limited_hosts: Vec::new(),
            elapsed_secs: elapsed.as_secs_f64(),
            dry_run,
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlSummary {
    /// Pages fetched successfully
    pub pages_fetched: u64,

    /// Pages not fetched because robots.txt disallows them
    pub pages_skipped: u64,

    /// Pages that failed after retries or permanently
    pub pages_failed: u64,

    /// Item pages not fetched because the item is already in the output
    pub pages_already_collected: u64,

    /// Records discarded for missing fields
    pub items_dropped: u64,

    /// New records accepted (written, or would be written in a dry run)
    pub items_written: u64,

    /// Records whose URL was already collected
    pub duplicates: u64,

    /// Primary output write failures
    pub write_failures: u64,

    /// Mirror output write failures
    pub mirror_failures: u64,

    /// Hosts that answered HTTP 429
    pub rate_limited_hosts: Vec<String>,

    pub elapsed_secs: f64,

    pub dry_run: bool,
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Pages:");
    println!("  Fetched: {}", summary.pages_fetched);
    println!("  Skipped (robots.txt): {}", summary.pages_skipped);
    println!("  Failed: {}", summary.pages_failed);
    if summary.pages_already_collected > 0 {
        println!("  Already collected: {}", summary.pages_already_collected);
    }
    println!();

    println!("Items:");
    if summary.dry_run {
        println!("  New (dry run, not written): {}", summary.items_written);
    } else {
        println!("  Written: {}", summary.items_written);
    }
    println!("  Duplicates: {}", summary.duplicates);
    println!("  Dropped (incomplete): {}", summary.items_dropped);
    println!();

    if summary.write_failures > 0 || summary.mirror_failures > 0 {
        println!("Write Failures:");
        println!("  Primary: {}", summary.write_failures);
        println!("  Mirror: {}", summary.mirror_failures);
        println!();
    }

    if !summary.rate_limited_hosts.is_empty() {
        println!("Rate Limited Hosts ({}):", summary.rate_limited_hosts.len());
        for host in &summary.rate_limited_hosts {
            println!("  - {}", host);
        }
        println!();
    }

    println!("Elapsed: {:.1}s", summary.elapsed_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_feed_summary() {
        let stats = CrawlStats::new();
        stats.add_fetched(3);
        stats.add_fetched(2);
        stats.add_skipped(1);
        stats.add_written(40);
        stats.add_duplicates(4);
        stats.add_mirror_failures(1);

        let summary = stats.summary(Duration::from_millis(1500), false);
        assert_eq!(summary.pages_fetched, 5);
        assert_eq!(summary.pages_skipped, 1);
        assert_eq!(summary.items_written, 40);
        assert_eq!(summary.duplicates, 4);
        assert_eq!(summary.mirror_failures, 1);
        assert_eq!(summary.write_failures, 0);
        assert_eq!(summary.elapsed_secs, 1.5);
        assert!(!summary.dry_run);
    }
}
