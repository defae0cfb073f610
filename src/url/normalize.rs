use crate::UrlError;
use url::Url;

/// Query parameters that never change the page served
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Canonicalizes a URL so it can serve as a dedup key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https
/// 3. Lowercase the host (scheme and default port are handled by `url`)
/// 4. Collapse repeated slashes in the path, keeping a trailing slash
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and sort the rest
/// 7. Remove an empty query string
///
/// Trailing slashes are kept on purpose: catalogue directories such as
/// `/catalogue/category/books/travel_2/` are the base for relative links on
/// the page, and stripping the slash would change how those links resolve.
///
/// # Examples
///
/// ```
/// use shelf_sweep::url::canonicalize_url;
///
/// let url = canonicalize_url("HTTP://Books.Example.COM//catalogue/page-2.html#top").unwrap();
/// assert_eq!(url.as_str(), "http://books.example.com/catalogue/page-2.html");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    canonicalize_parsed(&mut url)?;
    Ok(url)
}

/// Canonicalizes an already-parsed URL in place
pub(crate) fn canonicalize_parsed(url: &mut Url) -> Result<(), UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(())
}

/// Collapses empty path segments while preserving a trailing slash
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if path.ends_with('/') {
        result.push('/');
    }
    result
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
