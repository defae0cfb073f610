//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the worker pool that drives a run:
//! - Opening the output store and loading robots.txt before any worker starts
//! - Sharing the frontier, store, fetcher and counters between workers
//! - Enforcing the global page budget
//! - Deciding which discovered links and records a page contributes
//! - Graceful shutdown on budget exhaustion or Ctrl-C

use crate::config::{validate, Config};
use crate::crawler::fetcher::{build_http_client, FetchOutcome, Fetcher};
use crate::crawler::frontier::{Frontier, FrontierEntry, FrontierKind};
use crate::crawler::parser::{parse_page, PageKind};
use crate::crawler::retry::RetryPolicy;
use crate::output::{CrawlStats, CrawlSummary};
use crate::robots::{load_policy, RobotsGate};
use crate::state::HostThrottle;
use crate::storage::{RecordOutcome, ResumeStore};
use crate::url::{canonicalize_url, host_key};
use crate::{CrawlError, UrlError};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Global cap on page fetches, shared by all workers
#[derive(Debug)]
pub struct PageBudget {
    used: AtomicU32,
    max: u32,
}

impl PageBudget {
    pub fn new(max: u32) -> Self {
        Self {
            used: AtomicU32::new(0),
            max,
        }
    }

    /// Takes one page from the budget; false once it is spent
    pub fn try_reserve(&self) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                (used < self.max).then_some(used + 1)
            })
            .is_ok()
    }

    /// Returns a page that was reserved but not fetched
    pub fn refund(&self) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_sub(1)
            });
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }
}

/// State shared by every worker
struct CrawlContext {
    config: Config,
    seed: Url,
    fetcher: Fetcher,
    frontier: Frontier,
    store: ResumeStore,
    stats: CrawlStats,
    budget: PageBudget,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
}

impl Coordinator {
    /// Prepares a run
    ///
    /// Every startup-fatal condition surfaces here, before any worker
    /// starts: invalid configuration, an unusable start URL, unopenable
    /// output, or a start host that never answers the robots.txt request.
    pub async fn new(config: Config) -> Result<Self, CrawlError> {
        validate(&config)?;

        let seed = canonicalize_url(&config.crawler.start_url)?;
        let host = host_key(&seed).ok_or(UrlError::MissingHost)?;

        let store = ResumeStore::open(
            Path::new(&config.output.primary_path),
            Path::new(&config.output.mirror_path),
            config.crawler.dry_run,
        )?;
        if store.skipped_lines() > 0 {
            tracing::warn!(
                "{} unreadable lines in {} were ignored",
                store.skipped_lines(),
                config.output.primary_path
            );
        }

        let default_delay = Duration::from_millis(config.crawler.delay_ms);
        let bootstrap = Fetcher::new(
            build_http_client(&config)?,
            Arc::new(RobotsGate::new(default_delay)),
            Arc::new(HostThrottle::new()),
            RetryPolicy::from_config(&config.fetch),
        );

        let policy = load_policy(&bootstrap, &seed, &config.user_agent.crawler_name).await?;
        let gate = RobotsGate::new(default_delay).with_policy(host.clone(), policy);
        tracing::info!("Effective delay for {}: {:?}", host, gate.crawl_delay(&host));
        let fetcher = bootstrap.with_robots(Arc::new(gate));

        let frontier = Frontier::scoped_to(&seed);
        frontier.enqueue([FrontierEntry::new(seed.clone(), FrontierKind::CategoryIndex)]);

        Ok(Self {
            ctx: Arc::new(CrawlContext {
                budget: PageBudget::new(config.crawler.max_pages),
                config,
                seed,
                fetcher,
                frontier,
                store,
                stats: CrawlStats::new(),
            }),
        })
    }

    /// Runs the worker pool until the frontier is exhausted, the page
    /// budget is spent, or the process is interrupted
    pub async fn run(self) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        let ctx = self.ctx;
        let workers = ctx.config.crawler.concurrency.max(1) as usize;

        tracing::info!(
            "Starting crawl at {} with {} worker(s), max {} pages ({} URLs already collected)",
            ctx.seed,
            workers,
            ctx.budget.max,
            ctx.store.preexisting()
        );

        let interrupt = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, finishing in-flight pages");
                    ctx.frontier.shutdown();
                }
            })
        };

        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(run_worker(ctx.clone(), id)))
            .collect();

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }
        interrupt.abort();

        let mut summary = ctx
            .stats
            .summary(started.elapsed(), ctx.config.crawler.dry_run);
        summary.rate_limited_hosts = ctx.fetcher.throttle().rate_limited_hosts();

        tracing::info!(
            "Crawl finished: {} pages fetched, {} items new, {} duplicates in {:?}",
            summary.pages_fetched,
            summary.items_written,
            summary.duplicates,
            started.elapsed()
        );

        Ok(summary)
    }
}

async fn run_worker(ctx: Arc<CrawlContext>, id: usize) {
    tracing::debug!("Worker {} started", id);

    while let Some(entry) = ctx.frontier.next().await {
        ctx.process(entry).await;
        ctx.frontier.complete();
    }

    tracing::debug!("Worker {} finished", id);
}

impl CrawlContext {
    async fn process(&self, entry: FrontierEntry) {
        if entry.kind == FrontierKind::ItemPage && self.store.contains(entry.url.as_str()) {
            tracing::debug!("Already collected, not fetching {}", entry.url);
            self.stats.add_known(1);
            return;
        }

        // Disallowed pages never touch the budget
        if !self.fetcher.robots().is_allowed(&entry.url) {
            tracing::info!("Skipping {} (disallowed by robots.txt)", entry.url);
            self.stats.add_skipped(1);
            return;
        }

        if !self.budget.try_reserve() {
            if !self.frontier.is_shutdown() {
                tracing::info!("Page budget of {} reached, stopping", self.budget.max);
                self.frontier.shutdown();
            }
            return;
        }

        match self.fetcher.get(&entry.url).await {
            FetchOutcome::Success {
                final_url, body, ..
            } => {
                self.stats.add_fetched(1);
                self.handle_page(&entry, &final_url, &body);

                let fetched = self.stats.fetched();
                if fetched % 10 == 0 {
                    tracing::info!(
                        "Progress: {} pages fetched, {} queued, {} items new",
                        fetched,
                        self.frontier.len(),
                        self.stats.written()
                    );
                }
            }
            FetchOutcome::RetryableFailure { reason, attempts } => {
                tracing::warn!(
                    "Failed {} after {} attempts: {}",
                    entry.url,
                    attempts,
                    reason
                );
                self.stats.add_failed(1);
            }
            FetchOutcome::PermanentFailure { reason } => {
                tracing::warn!("Failed {}: {}", entry.url, reason);
                self.stats.add_failed(1);
            }
            FetchOutcome::Disallowed => {
                self.budget.refund();
                self.stats.add_skipped(1);
            }
        }
    }

    fn handle_page(&self, entry: &FrontierEntry, page_url: &Url, body: &str) {
        let crawler = &self.config.crawler;
        let parsed = parse_page(body, page_url);
        self.stats.add_dropped(parsed.dropped as u64);

        // The seed lists a mix of categories; with category-first its items
        // and pagination are left to the category pages. A seed that is
        // itself a category links to itself and is crawled like one.
        let seed_is_category = parsed.next_urls.iter().any(|next| {
            next.kind == FrontierKind::CategoryIndex
                && (next.url == entry.url || next.url == *page_url)
        });
        let seed_index = crawler.category_first
            && entry.url == self.seed
            && !seed_is_category
            && parsed.category_links() > 0;
        if seed_index {
            tracing::info!(
                "Seed page links {} categories, crawling category-first",
                parsed.category_links()
            );
        }

        let next: Vec<FrontierEntry> = parsed
            .next_urls
            .into_iter()
            .filter(|next| match next.kind {
                FrontierKind::CategoryIndex => true,
                FrontierKind::PaginationNext => !seed_index,
                FrontierKind::ItemPage => {
                    crawler.follow_item_pages && !self.store.contains(next.url.as_str())
                }
            })
            .collect();
        let queued = self.frontier.enqueue(next);
        tracing::debug!("{}: {} new links queued", page_url, queued);

        let keep_items = match parsed.kind {
            PageKind::Detail => true,
            PageKind::Listing => !crawler.follow_item_pages && !seed_index,
        };
        if !keep_items {
            return;
        }

        for item in &parsed.items {
            match self.store.record(item) {
                RecordOutcome::Written | RecordOutcome::Accepted => self.stats.add_written(1),
                RecordOutcome::MirrorFailed => {
                    self.stats.add_written(1);
                    self.stats.add_mirror_failures(1);
                }
                RecordOutcome::Duplicate => self.stats.add_duplicates(1),
                RecordOutcome::WriteFailed => self.stats.add_write_failures(1),
            }
        }
    }
}

/// Runs a complete crawl and returns its summary
pub async fn run_crawl(config: Config) -> Result<CrawlSummary, CrawlError> {
    Coordinator::new(config).await?.run().await
}
