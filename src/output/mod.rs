//! Output module for item records and crawl summaries
//!
//! This module handles:
//! - The on-disk item record and its schema version
//! - Reading output files back (the reference consumer loader)
//! - Run counters and the end-of-run summary

mod loader;
mod record;
pub mod stats;

pub use loader::{load_items, LoadedItems};
pub use record::{ItemRecord, SCHEMA_VERSION};
pub use stats::{print_summary, CrawlStats, CrawlSummary};
