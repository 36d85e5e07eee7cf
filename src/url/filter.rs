use crate::url::extract_domain;
use url::Url;

/// File extensions that never lead to crawlable content
const EXCLUDED_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "svg", "webp", "bmp", "ico", "css", "js", "json", "xml",
    "zip", "rar", "gz", "tar", "mp3", "mp4", "avi", "mov", "webm", "woff", "woff2", "ttf", "eot",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx",
];

/// Path segments that mark non-content pages
const EXCLUDED_SEGMENTS: &[&str] = &[
    "admin", "wp-admin", "login", "wp-login", "logout", "signin", "sign-in", "register", "account",
    "cart", "basket", "checkout", "error", "404", "500",
];

/// URL fragments that indicate an English version of a page
const ENGLISH_URL_PATTERNS: &[&str] = &[
    "/en/", "/en-", "/en_", "?lang=en", "&lang=en", "?hl=en", "&hl=en", "?locale=en", "&locale=en",
    "/english",
];

/// Reason a discovered link was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRejection {
    /// Not http or https
    Scheme,
    /// Points to a different host than the crawl target
    OffHost,
    /// Binary or asset file
    Asset,
    /// Administrative or error page
    NonContent,
}

/// Returns true if both URLs live on the same host (ignoring case and `www.`)
pub fn same_host(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(ha), Some(hb)) => ha == hb && a.port_or_known_default() == b.port_or_known_default(),
        _ => false,
    }
}

/// Decides whether a resolved link may join the crawl frontier
///
/// # Arguments
///
/// * `link` - The absolute link found on a page
/// * `target` - The URL of the site being crawled
///
/// # Returns
///
/// * `Ok(())` - The link qualifies
/// * `Err(LinkRejection)` - Why the link was dropped
pub fn qualify_link(link: &Url, target: &Url) -> Result<(), LinkRejection> {
    if link.scheme() != "http" && link.scheme() != "https" {
        return Err(LinkRejection::Scheme);
    }

    if !same_host(link, target) {
        return Err(LinkRejection::OffHost);
    }

    let path = link.path().to_lowercase();
    let last_segment = path.rsplit('/').next().unwrap_or("");
    if let Some((_, ext)) = last_segment.rsplit_once('.') {
        if EXCLUDED_EXTENSIONS.contains(&ext) {
            return Err(LinkRejection::Asset);
        }
    }

    let non_content = path.split('/').any(|segment| {
        let stem = segment.split('.').next().unwrap_or(segment);
        EXCLUDED_SEGMENTS.contains(&stem)
    });
    if non_content {
        return Err(LinkRejection::NonContent);
    }

    Ok(())
}

/// Returns true if a page URL or its declared language signals English content
pub fn signals_english(url: &str, language: Option<&str>) -> bool {
    let lowered = url.to_lowercase();
    if ENGLISH_URL_PATTERNS.iter().any(|p| lowered.contains(p)) || lowered.ends_with("/en") {
        return true;
    }

    language
        .map(|lang| lang.trim().to_lowercase().starts_with("en"))
        .unwrap_or(false)
}
