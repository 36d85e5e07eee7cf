//! URL handling module for Directory Harvester
//!
//! This module provides deduplication keys, link qualification for the crawl
//! frontier, and detection of English-language page variants.

mod filter;
mod normalize;

// Re-export main functions
pub use filter::{qualify_link, same_host, signals_english, LinkRejection};
pub use normalize::{dedup_key, dedup_key_for};

use url::Url;

/// Extracts the registrable-looking host of a URL: lowercase, without `www.`
///
/// Returns None if the URL has no host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use directory_harvester::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let h = h.to_lowercase();
        h.strip_prefix("www.").map(str::to_string).unwrap_or(h)
    })
}

/// Resolves a website value as stored on a business into an absolute URL
///
/// Bare hosts such as `example.com` are given an `https://` scheme. Empty
/// values mean the business has no website.
pub fn parse_website(website: &str) -> Option<Url> {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return None;
    }

    Url::parse(trimmed)
        .ok()
        .filter(|u| u.scheme() == "http" || u.scheme() == "https")
        .or_else(|| Url::parse(&format!("https://{}", trimmed)).ok())
        .filter(|u| u.host_str().is_some())
}
