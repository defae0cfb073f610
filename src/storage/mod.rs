//! Storage module for persisting crawl output
//!
//! This module handles everything that touches the output files:
//! - Appending records as newline-delimited JSON
//! - Scanning existing output so re-runs only append new items
//! - The shared seen-URL set guarding against duplicate writes

mod jsonl;
mod store;
mod traits;

pub use jsonl::{load_existing, ExistingUrls, JsonlSink};
pub use store::{RecordOutcome, ResumeStore};
pub use traits::{ItemSink, StorageError, StorageResult};
