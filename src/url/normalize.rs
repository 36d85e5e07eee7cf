use crate::{UrlError, UrlResult};
use url::Url;

/// List of tracking query parameters dropped from dedup keys
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
];

/// Computes the deduplication key for a URL
///
/// Two links that point at the same page produce the same key, whatever their
/// casing, trailing slash, fragment or tracking parameters.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not http(s)
/// 2. Drop the scheme (http and https variants collapse)
/// 3. Lowercase the host and remove a `www.` prefix; keep explicit ports
/// 4. Remove dot segments, duplicate slashes and the trailing slash
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and sort the rest
/// 7. Lowercase the whole key
///
/// # Examples
///
/// ```
/// use directory_harvester::url::dedup_key;
///
/// let a = dedup_key("https://WWW.Example.com/About/#team").unwrap();
/// let b = dedup_key("http://example.com/about").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn dedup_key(url_str: &str) -> UrlResult<String> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    dedup_key_for(&url)
}

/// Computes the deduplication key for an already parsed URL
pub fn dedup_key_for(url: &Url) -> UrlResult<String> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();

    let mut key = host;
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }
    key.push_str(&normalize_path(url.path()));

    let params = filter_and_sort_query_params(url);
    if !params.is_empty() {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }

    Ok(key.to_lowercase())
}

/// Normalizes a URL path: removes dot segments, empty segments and trailing slash
///
/// The root path normalizes to an empty string so `example.com` and
/// `example.com/` share a key.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
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

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
