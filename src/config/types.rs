use serde::Deserialize;

/// Default seed page of the catalogue
pub const DEFAULT_START_URL: &str = "http://books.toscrape.com/index.html";

/// Main configuration structure for Shelf-Sweep
///
/// Every section is optional in the TOML file; missing sections and keys fall
/// back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawl traversal configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Seed URL for the frontier
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Global cap on page fetches across all workers
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Number of concurrent workers
    pub concurrency: u32,

    /// Base per-host politeness delay (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Fetch and parse, but never write
    #[serde(rename = "dry-run")]
    pub dry_run: bool,

    /// Follow item detail pages instead of recording listing summaries
    #[serde(rename = "follow-item-pages")]
    pub follow_item_pages: bool,

    /// Discard the seed page's own items and pagination when it links categories
    #[serde(rename = "category-first")]
    pub category_first: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            max_pages: 5,
            concurrency: 1,
            delay_ms: 1000,
            dry_run: false,
            follow_item_pages: false,
            category_first: true,
        }
    }
}

/// Retry and timeout configuration for the fetcher
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum attempts per page, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt (milliseconds)
    #[serde(rename = "base-backoff-ms")]
    pub base_backoff_ms: u64,

    /// Multiplier applied to the backoff after each failed attempt
    #[serde(rename = "backoff-factor")]
    pub backoff_factor: f64,

    /// Upper bound for any single backoff, including server retry hints
    #[serde(rename = "max-backoff-ms")]
    pub max_backoff_ms: u64,

    /// Per-attempt request timeout (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            backoff_factor: 2.0,
            max_backoff_ms: 30_000,
            request_timeout_secs: 10,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt group token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "shelf-sweep".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/shelf-sweep/shelf-sweep".to_string(),
            contact_email: "crawler@shelf-sweep.dev".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Primary NDJSON file; also the resume source
    #[serde(rename = "primary-path")]
    pub primary_path: String,

    /// Mirror NDJSON file read by the viewer
    #[serde(rename = "mirror-path")]
    pub mirror_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            primary_path: "data/items.jsonl".to_string(),
            mirror_path: "web/data/items.jsonl".to_string(),
        }
    }
}
