//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Enforcing robots.txt decisions before any network call
//! - Per-host politeness delays
//! - Retry with exponential backoff for transient failures
//! - Error classification into a tagged [`FetchOutcome`]

use crate::config::Config;
use crate::crawler::retry::{parse_retry_after, RetryPolicy, RetryState};
use crate::robots::RobotsGate;
use crate::state::HostThrottle;
use crate::url::host_key;
use reqwest::{header::RETRY_AFTER, redirect::Policy, Client, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Why a fetch did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The request timed out
    Timeout,

    /// No HTTP response: connection refused or reset, DNS failure, TLS error
    Network(String),

    /// The server answered with a non-success status
    Status(u16),

    /// The response body could not be read
    Body(String),

    /// The URL cannot be fetched at all
    InvalidUrl(String),

    /// Redirect chain too long or looping
    Redirect(String),
}

impl FailureReason {
    /// Returns true if the host never produced an HTTP response
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network(_))
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "request timeout"),
            Self::Network(e) => write!(f, "network error: {}", e),
            Self::Status(code) => write!(f, "HTTP {}", code),
            Self::Body(e) => write!(f, "body read error: {}", e),
            Self::InvalidUrl(e) => write!(f, "invalid URL: {}", e),
            Self::Redirect(e) => write!(f, "redirect error: {}", e),
        }
    }
}

/// Result of a fetch operation
///
/// Outcomes are values, never errors; callers branch on the tag.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Successfully fetched the page
    Success {
        /// Final URL after redirects
        final_url: Url,
        /// HTTP status code
        status: u16,
        /// Page body, decoded as UTF-8
        body: String,
    },

    /// Transient failure that persisted through every attempt
    RetryableFailure {
        reason: FailureReason,
        attempts: u32,
    },

    /// Failure that retrying cannot fix
    PermanentFailure { reason: FailureReason },

    /// robots.txt forbids the URL; no request was sent
    Disallowed,
}

impl FetchOutcome {
    /// Returns true for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// What a single attempt produced
enum Attempt {
    Done(FetchOutcome),
    Retry {
        reason: FailureReason,
        hint: Option<Duration>,
    },
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use shelf_sweep::config::Config;
/// use shelf_sweep::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(Duration::from_secs(config.fetch.request_timeout_secs))
        .connect_timeout(Duration::from_secs(5))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Robots-aware, polite, retrying HTTP fetcher
///
/// Cloning is cheap; clones share the client, robots gate and host throttle.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    robots: Arc<RobotsGate>,
    throttle: Arc<HostThrottle>,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(
        client: Client,
        robots: Arc<RobotsGate>,
        throttle: Arc<HostThrottle>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            robots,
            throttle,
            retry,
        }
    }

    /// Returns a fetcher that enforces `robots`, keeping the same client and throttle
    pub fn with_robots(self, robots: Arc<RobotsGate>) -> Self {
        Self { robots, ..self }
    }

    /// The robots gate this fetcher enforces
    pub fn robots(&self) -> &RobotsGate {
        &self.robots
    }

    /// The shared per-host throttle
    pub fn throttle(&self) -> &HostThrottle {
        &self.throttle
    }

    /// Fetches a URL, enforcing robots.txt first
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | robots.txt disallow | No request → Disallowed |
    /// | HTTP 2xx | Success |
    /// | HTTP 429 | Retry, honoring Retry-After when present |
    /// | HTTP 5xx, 408 | Retry with exponential backoff |
    /// | Timeout, connection error | Retry with exponential backoff |
    /// | Other HTTP 4xx | Immediate → PermanentFailure |
    /// | Malformed URL, redirect loop | Immediate → PermanentFailure |
    ///
    /// After `max_attempts` retryable failures the last reason is returned
    /// as `RetryableFailure`.
    pub async fn get(&self, url: &Url) -> FetchOutcome {
        if !self.robots.is_allowed(url) {
            tracing::info!("URL {} disallowed by robots.txt", url);
            return FetchOutcome::Disallowed;
        }

        self.get_unchecked(url).await
    }

    /// Fetches a URL without consulting robots.txt
    ///
    /// Used to load robots.txt itself; politeness and retries still apply.
    pub async fn get_unchecked(&self, url: &Url) -> FetchOutcome {
        if url.scheme() != "http" && url.scheme() != "https" {
            return FetchOutcome::PermanentFailure {
                reason: FailureReason::InvalidUrl(format!("unsupported scheme {}", url.scheme())),
            };
        }

        let host = match host_key(url) {
            Some(host) => host,
            None => {
                return FetchOutcome::PermanentFailure {
                    reason: FailureReason::InvalidUrl("missing host".to_string()),
                }
            }
        };

        let delay = self.robots.crawl_delay(&host);
        let mut state = RetryState::new(&self.retry);

        loop {
            let attempt = state.begin_attempt();
            self.throttle.wait_turn(&host, delay).await;

            let (reason, hint) = match self.attempt(url).await {
                Attempt::Done(outcome) => return outcome,
                Attempt::Retry { reason, hint } => (reason, hint),
            };

            match state.next_backoff(hint) {
                Some(wait) => {
                    if reason == FailureReason::Status(429) {
                        self.throttle.mark_rate_limited(&host, wait);
                    }
                    tracing::warn!(
                        "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        url,
                        reason,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                None => {
                    tracing::warn!(
                        "Giving up on {} after {} attempts: {}",
                        url,
                        state.attempts(),
                        reason
                    );
                    return FetchOutcome::RetryableFailure {
                        reason,
                        attempts: state.attempts(),
                    };
                }
            }
        }
    }

    /// Sends one GET request and classifies the result
    async fn attempt(&self, url: &Url) -> Attempt {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return classify_error(&e),
        };

        let status = response.status();

        if status.is_success() {
            let final_url = response.url().clone();
            return match response.bytes().await {
                Ok(bytes) => {
                    tracing::debug!("Fetched {} ({} bytes)", final_url, bytes.len());
                    Attempt::Done(FetchOutcome::Success {
                        final_url,
                        status: status.as_u16(),
                        body: String::from_utf8_lossy(&bytes).into_owned(),
                    })
                }
                Err(e) => Attempt::Retry {
                    reason: FailureReason::Body(e.to_string()),
                    hint: None,
                },
            };
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let hint = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, chrono::Utc::now()));
            return Attempt::Retry {
                reason: FailureReason::Status(status.as_u16()),
                hint,
            };
        }

        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            return Attempt::Retry {
                reason: FailureReason::Status(status.as_u16()),
                hint: None,
            };
        }

        tracing::debug!("Permanent HTTP {} for {}", status.as_u16(), url);
        Attempt::Done(FetchOutcome::PermanentFailure {
            reason: FailureReason::Status(status.as_u16()),
        })
    }
}

/// Maps a transport-level reqwest error to a retry decision
fn classify_error(e: &reqwest::Error) -> Attempt {
    if e.is_builder() {
        return Attempt::Done(FetchOutcome::PermanentFailure {
            reason: FailureReason::InvalidUrl(e.to_string()),
        });
    }

    if e.is_redirect() {
        return Attempt::Done(FetchOutcome::PermanentFailure {
            reason: FailureReason::Redirect(e.to_string()),
        });
    }

    let reason = if e.is_timeout() {
        FailureReason::Timeout
    } else {
        FailureReason::Network(e.to_string())
    };

    Attempt::Retry { reason, hint: None }
}
