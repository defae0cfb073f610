//! Robots.txt handling module
//!
//! This module fetches robots.txt once per run, snapshots the rules that
//! apply to our crawler, and answers allow/deny and crawl-delay queries.

mod parser;

pub use parser::RobotsPolicy;

use crate::crawler::{FetchOutcome, Fetcher};
use crate::url::host_key;
use crate::CrawlError;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Permission gate consulted before every page request
///
/// Hosts without a loaded policy are allowed. The gate is immutable once the
/// crawl starts and is shared between workers behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RobotsGate {
    policies: HashMap<String, RobotsPolicy>,
    default_delay: Duration,
}

impl RobotsGate {
    /// Creates a gate with no policies and the configured politeness delay
    pub fn new(default_delay: Duration) -> Self {
        Self {
            policies: HashMap::new(),
            default_delay,
        }
    }

    /// Adds the policy for `host` (as produced by [`host_key`])
    pub fn with_policy(mut self, host: impl Into<String>, policy: RobotsPolicy) -> Self {
        self.policies.insert(host.into(), policy);
        self
    }

    /// Checks if a URL is allowed by robots.txt
    pub fn is_allowed(&self, url: &Url) -> bool {
        let policy = match host_key(url).and_then(|host| self.policies.get(&host)) {
            Some(policy) => policy,
            None => return true,
        };

        let target = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        policy.is_allowed(&target)
    }

    /// Effective delay between requests to `host`
    ///
    /// The larger of the configured delay and the robots.txt Crawl-delay.
    pub fn crawl_delay(&self, host: &str) -> Duration {
        self.policies
            .get(host)
            .and_then(|policy| policy.crawl_delay)
            .map_or(self.default_delay, |delay| delay.max(self.default_delay))
    }
}

/// Fetches and parses robots.txt for the host of `start_url`
///
/// # Outcomes
///
/// * 2xx → rules parsed from the body
/// * 4xx, or 5xx that persisted through retries → allow-all
/// * No HTTP response at all after retries → `CrawlError::RobotsUnreachable`
pub async fn load_policy(
    fetcher: &Fetcher,
    start_url: &Url,
    user_agent: &str,
) -> Result<RobotsPolicy, CrawlError> {
    let robots_url = start_url.join("/robots.txt")?;
    tracing::info!("Fetching {}", robots_url);

    match fetcher.get_unchecked(&robots_url).await {
        FetchOutcome::Success { body, .. } => {
            let policy = RobotsPolicy::from_content(&body, user_agent);
            tracing::info!(
                "robots.txt loaded: {} disallow, {} allow rules, crawl-delay {:?}",
                policy.disallow.len(),
                policy.allow.len(),
                policy.crawl_delay
            );
            Ok(policy)
        }
        FetchOutcome::RetryableFailure { reason, .. } if reason.is_transport() => {
            Err(CrawlError::RobotsUnreachable {
                url: robots_url.to_string(),
                reason: reason.to_string(),
            })
        }
        FetchOutcome::RetryableFailure { reason, .. }
        | FetchOutcome::PermanentFailure { reason } => {
            tracing::info!("No usable robots.txt ({}), allowing all", reason);
            Ok(RobotsPolicy::allow_all())
        }
        FetchOutcome::Disallowed => Ok(RobotsPolicy::allow_all()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::crawler::{build_http_client, RetryPolicy};
    use crate::state::HostThrottle;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate_with(content: &str) -> RobotsGate {
        RobotsGate::new(Duration::from_millis(1000)).with_policy(
            "books.example.com",
            RobotsPolicy::from_content(content, "shelf-sweep"),
        )
    }

    fn bootstrap_fetcher() -> Fetcher {
        Fetcher::new(
            build_http_client(&Config::default()).unwrap(),
            Arc::new(RobotsGate::new(Duration::ZERO)),
            Arc::new(HostThrottle::new()),
            RetryPolicy {
                max_attempts: 2,
                base_backoff: Duration::from_millis(5),
                factor: 2.0,
                max_backoff: Duration::from_millis(10),
            },
        )
    }

    #[test]
    fn test_unknown_host_is_allowed() {
        let gate = gate_with("User-agent: *\nDisallow: /");
        let url = Url::parse("http://other.example.com/page").unwrap();
        assert!(gate.is_allowed(&url));
    }

    #[test]
    fn test_gate_applies_host_policy() {
        let gate = gate_with("User-agent: *\nDisallow: /catalogue/");
        let blocked = Url::parse("http://books.example.com/catalogue/x.html").unwrap();
        let open = Url::parse("http://books.example.com/index.html").unwrap();
        assert!(!gate.is_allowed(&blocked));
        assert!(gate.is_allowed(&open));
    }

    #[test]
    fn test_gate_matches_query() {
        let gate = gate_with("User-agent: *\nDisallow: /search?q=");
        let url = Url::parse("http://books.example.com/search?q=dune").unwrap();
        assert!(!gate.is_allowed(&url));
    }

    #[test]
    fn test_crawl_delay_takes_the_larger_value() {
        let gate = gate_with("User-agent: *\nCrawl-delay: 3");
        assert_eq!(gate.crawl_delay("books.example.com"), Duration::from_secs(3));

        let gate = gate_with("User-agent: *\nCrawl-delay: 0.5");
        assert_eq!(gate.crawl_delay("books.example.com"), Duration::from_secs(1));

        assert_eq!(gate.crawl_delay("other.example.com"), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_load_policy_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /cart"))
            .expect(1)
            .mount(&server)
            .await;

        let start = Url::parse(&format!("{}/index.html", server.uri())).unwrap();
        let policy = load_policy(&bootstrap_fetcher(), &start, "shelf-sweep")
            .await
            .unwrap();
        assert_eq!(policy.disallow, vec!["/cart".to_string()]);
    }

    #[tokio::test]
    async fn test_load_policy_missing_file_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let start = Url::parse(&format!("{}/index.html", server.uri())).unwrap();
        let policy = load_policy(&bootstrap_fetcher(), &start, "shelf-sweep")
            .await
            .unwrap();
        assert!(policy.is_empty());
    }

    #[tokio::test]
    async fn test_load_policy_server_error_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let start = Url::parse(&format!("{}/index.html", server.uri())).unwrap();
        let policy = load_policy(&bootstrap_fetcher(), &start, "shelf-sweep")
            .await
            .unwrap();
        assert!(policy.is_empty());
    }

    #[tokio::test]
    async fn test_load_policy_unreachable_host_is_fatal() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let start = Url::parse(&format!("http://127.0.0.1:{}/index.html", port)).unwrap();
        let result = load_policy(&bootstrap_fetcher(), &start, "shelf-sweep").await;
        assert!(matches!(result, Err(CrawlError::RobotsUnreachable { .. })));
    }
}
