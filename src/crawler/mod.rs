//! Crawler module for catalogue fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with robots.txt enforcement, politeness and retry logic
//! - HTML parsing into item records and follow-up links
//! - The shared frontier of pages still to visit
//! - Overall crawl coordination across workers

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod retry;

pub use coordinator::{run_crawl, Coordinator, PageBudget};
pub use fetcher::{build_http_client, FailureReason, FetchOutcome, Fetcher};
pub use frontier::{Frontier, FrontierEntry, FrontierKind};
pub use parser::{parse_page, parse_price, parse_rating, resolve_category, PageKind, ParsedPage};
pub use retry::{parse_retry_after, RetryPolicy, RetryState};
