//! Retry state machine for the fetcher
//!
//! A `RetryState` lives for one `Fetcher::get` call. The fetcher asks it for
//! the next backoff after every retryable failure; `None` means the attempt
//! budget is spent and the failure is final.

use crate::config::FetchConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Retry limits and backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum attempts per page, including the first one
    pub max_attempts: u32,

    /// Backoff before the second attempt
    pub base_backoff: Duration,

    /// Multiplier applied per additional attempt
    pub factor: f64,

    /// Cap for any single backoff, including server hints
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Builds the policy from the `[fetch]` configuration section
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            factor: config.backoff_factor,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Backoff after `attempt` failed attempts (1-based)
    ///
    /// `base * factor^(attempt - 1)`, capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_backoff.as_millis() as f64 * self.factor.powi(exponent);
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Attempt counter for a single fetch
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    attempts: u32,
}

impl<'a> RetryState<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Records the start of an attempt and returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Decides what happens after a retryable failure
    ///
    /// Returns the wait before the next attempt, or `None` once
    /// `max_attempts` attempts have been made. A server hint (Retry-After)
    /// replaces the schedule but is still capped at `max_backoff`.
    pub fn next_backoff(&self, hint: Option<Duration>) -> Option<Duration> {
        if self.attempts >= self.policy.max_attempts {
            return None;
        }

        Some(match hint {
            Some(hint) => hint.min(self.policy.max_backoff),
            None => self.policy.backoff_for(self.attempts),
        })
    }
}

/// Parses a Retry-After header value
///
/// Accepts delta-seconds (`120`) or an HTTP date
/// (`Wed, 21 Oct 2015 07:28:00 GMT`). Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((when - now).to_std().unwrap_or(Duration::ZERO))
}
