//! Configuration module for Shelf-Sweep
//!
//! Settings come from three layers: built-in defaults, an optional TOML file,
//! and command-line overrides.
//!
//! # Example
//!
//! ```no_run
//! use shelf_sweep::config::{resolve_config, Overrides};
//! use std::path::Path;
//!
//! let config = resolve_config(Some(Path::new("crawl.toml")), &Overrides::default()).unwrap();
//! println!("Crawler will fetch at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, UserAgentConfig, DEFAULT_START_URL,
};

// Re-export parser functions
pub use parser::{resolve_config, settings_fingerprint, Overrides};
pub use validation::validate;
