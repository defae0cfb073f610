//! Shelf-Sweep: a polite catalogue crawler
//!
//! This crate crawls a structurally stable e-commerce catalogue, extracts one
//! record per listed item and appends the records as newline-delimited JSON to
//! a primary file and a mirror file, respecting robots.txt and per-host
//! politeness delays. Re-running a crawl against existing output only appends
//! items that are not already present.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Startup-fatal errors
///
/// Page-level and record-level failures never surface as a `CrawlError`; they
/// are reported as [`crawler::FetchOutcome`] values and counted in the
/// end-of-run summary.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Start host unreachable while loading {url}: {reason}")]
    RobotsUnreachable { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchOutcome, FrontierEntry, FrontierKind};
pub use output::{CrawlSummary, ItemRecord, SCHEMA_VERSION};
pub use robots::RobotsGate;
pub use storage::ResumeStore;
pub use url::canonicalize_url;
