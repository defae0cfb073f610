//! URL handling module for Shelf-Sweep
//!
//! This module provides canonicalization (the dedup key for items and
//! frontier entries), link resolution against a page URL, and host scoping.

mod normalize;

use ::url::Url;

pub use normalize::canonicalize_url;

/// Extracts the lowercase host of a URL, including a non-default port
///
/// The port is part of the key so that politeness and robots policies for
/// two services on one machine stay separate.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use shelf_sweep::url::host_key;
///
/// let url = Url::parse("http://Books.Example.com/index.html").unwrap();
/// assert_eq!(host_key(&url), Some("books.example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns true if both URLs share scheme-independent host and port
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (host_key(a), host_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Resolves a link href against the page URL and canonicalizes it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel:, data: schemes
/// - fragment-only anchors
/// - invalid URLs
/// - non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    normalize::canonicalize_parsed(&mut absolute).ok()?;
    Some(absolute)
}
