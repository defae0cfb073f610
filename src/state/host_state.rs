use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Tracks the politeness state of a host during crawling
///
/// `next_allowed` is the earliest instant the next request may start. Slots
/// are handed out in order, so concurrent workers targeting the same host
/// queue up behind each other instead of firing together.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests scheduled against this host in the current run
    pub request_count: u32,

    /// Earliest start time of the next request
    pub next_allowed: Option<Instant>,

    /// Whether this host has answered HTTP 429 during the run
    pub rate_limited: bool,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        match self.next_allowed {
            Some(next) if next > now => Some(next - now),
            _ => None,
        }
    }

    /// Claims the next request slot and returns how long to wait for it
    pub fn claim_slot(&mut self, delay: Duration, now: Instant) -> Duration {
        let wait = self.time_until_next_request(now).unwrap_or(Duration::ZERO);
        let start = now + wait;
        self.next_allowed = Some(start + delay);
        self.request_count += 1;
        wait
    }

    /// Pushes the next slot out to at least `until`
    pub fn defer_until(&mut self, until: Instant) {
        self.next_allowed = Some(match self.next_allowed {
            Some(next) if next > until => next,
            _ => until,
        });
    }
}

/// Per-host politeness gate shared by all workers
#[derive(Debug, Default)]
pub struct HostThrottle {
    hosts: Mutex<HashMap<String, HostState>>,
}

impl HostThrottle {
    /// Creates an empty throttle
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HostState>> {
        self.hosts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves the next request slot for `host`
    ///
    /// The reservation happens under the lock; the caller sleeps for the
    /// returned duration outside of it.
    pub fn reserve(&self, host: &str, delay: Duration) -> Duration {
        self.reserve_at(host, delay, Instant::now())
    }

    fn reserve_at(&self, host: &str, delay: Duration, now: Instant) -> Duration {
        let mut hosts = self.lock();
        hosts
            .entry(host.to_string())
            .or_insert_with(HostState::new)
            .claim_slot(delay, now)
    }

    /// Waits until `host` may receive the next request
    pub async fn wait_turn(&self, host: &str, delay: Duration) {
        let wait = self.reserve(host, delay);
        if !wait.is_zero() {
            tracing::trace!("Politeness wait of {:?} for {}", wait, host);
            tokio::time::sleep(wait).await;
        }
    }

    /// Marks a host as rate limited and holds every worker off it for `wait`
    pub fn mark_rate_limited(&self, host: &str, wait: Duration) {
        let mut hosts = self.lock();
        let state = hosts.entry(host.to_string()).or_insert_with(HostState::new);
        state.rate_limited = true;
        state.defer_until(Instant::now() + wait);
    }

    /// Gets a copy of the state for a specific host
    pub fn get_host_state(&self, host: &str) -> Option<HostState> {
        self.lock().get(host).cloned()
    }

    /// Hosts that answered HTTP 429 at least once
    pub fn rate_limited_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .lock()
            .iter()
            .filter(|(_, state)| state.rate_limited)
            .map(|(host, _)| host.clone())
            .collect();
        hosts.sort();
        hosts
    }
}
