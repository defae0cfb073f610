//! Shelf-Sweep main entry point
//!
//! This is the command-line interface for the Shelf-Sweep catalogue crawler.

use anyhow::Context;
use clap::Parser;
use shelf_sweep::config::{resolve_config, settings_fingerprint, Overrides, DEFAULT_START_URL};
use shelf_sweep::crawler::run_crawl;
use shelf_sweep::output::print_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Shelf-Sweep: a polite catalogue crawler
///
/// Shelf-Sweep crawls a book catalogue category by category while
/// respecting robots.txt and per-host delays, and appends one JSON record
/// per item to a primary and a mirror file. Re-running against existing
/// output only appends items that are not already there.
#[derive(Parser, Debug)]
#[command(name = "shelf-sweep")]
#[command(version)]
#[command(about = "A polite catalogue crawler", long_about = None)]
struct Cli {
    /// Seed URL of the catalogue
    #[arg(long, value_name = "URL", default_value = DEFAULT_START_URL)]
    start: String,

    /// Maximum number of pages to fetch across all workers
    #[arg(long, value_name = "N", default_value_t = 5)]
    max_pages: u32,

    /// Number of concurrent workers
    #[arg(long, value_name = "N", default_value_t = 1)]
    concurrency: u32,

    /// Minimum delay between requests to the same host (milliseconds)
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    delay_ms: u64,

    /// Fetch and parse, but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Optional TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Primary output file (also the resume source)
    #[arg(long, value_name = "PATH")]
    output: Option<String>,

    /// Mirror output file
    #[arg(long, value_name = "PATH")]
    mirror: Option<String>,

    /// Fetch item detail pages instead of recording listing summaries
    #[arg(long)]
    follow_items: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Flags the user actually typed override the config file;
    /// untouched flags leave the file (or built-in default) in charge
    fn overrides(&self, matches: &clap::ArgMatches) -> Overrides {
        let explicit = |id: &str| {
            matches.value_source(id) == Some(clap::parser::ValueSource::CommandLine)
        };

        Overrides {
            start_url: explicit("start").then(|| self.start.clone()),
            max_pages: explicit("max_pages").then_some(self.max_pages),
            concurrency: explicit("concurrency").then_some(self.concurrency),
            delay_ms: explicit("delay_ms").then_some(self.delay_ms),
            dry_run: self.dry_run,
            follow_item_pages: self.follow_items,
            primary_path: self.output.clone(),
            mirror_path: self.mirror.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = <Cli as clap::CommandFactory>::command().get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if let Some(path) = &cli.config {
        tracing::info!("Loading configuration from: {}", path.display());
    }
    let config = resolve_config(cli.config.as_deref(), &cli.overrides(&matches))
        .context("Failed to load configuration")?;
    tracing::info!(
        "Configuration resolved (fingerprint: {})",
        settings_fingerprint(&config)
    );

    let summary = run_crawl(config).await.context("Crawl failed to start")?;

    if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shelf_sweep=info,warn"),
            1 => EnvFilter::new("shelf_sweep=debug,info"),
            2 => EnvFilter::new("shelf_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
