//! State module for tracking per-host crawl progress
//!
//! # Components
//!
//! - `HostState`: request count, next permitted request time and rate-limit flag for one host
//! - `HostThrottle`: the shared, mutex-guarded map of host states used for politeness

mod host_state;

// Re-export main types
pub use host_state::{HostState, HostThrottle};
