//! HTML parser for extracting page content and metadata
//!
//! This module turns fetched markup into a structured record:
//! - Title, meta description and declared language
//! - Visible text and headings
//! - Outbound links (absolute, http(s) only)
//! - Embedded JSON-LD restricted to an allow-list of business types
//! - Social-proof signals (short testimonials, award and certification mentions)

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Maximum headings kept per page
pub const MAX_HEADINGS: usize = 20;

/// Maximum testimonials or awards kept per page
const MAX_SIGNALS_PER_PAGE: usize = 10;

/// Length bounds for a quoted testimonial (characters)
const TESTIMONIAL_MIN_CHARS: usize = 20;
const TESTIMONIAL_MAX_CHARS: usize = 300;

/// Longest sentence still accepted as an award mention
const AWARD_MAX_CHARS: usize = 200;

/// Words that mark a sentence as an award or certification mention
const AWARD_KEYWORDS: &[&str] = &[
    "award",
    "winner",
    "certified",
    "certification",
    "accredited",
    "best of",
    "michelin",
    "five-star",
    "5-star",
    "auszeichnung",
    "ausgezeichnet",
    "zertifiziert",
    "prix",
    "premio",
];

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title>)
    pub title: Option<String>,

    /// Meta description (falls back to og:description)
    pub description: Option<String>,

    /// Declared language (html lang, then content-language meta)
    pub language: Option<String>,

    /// Visible text with whitespace collapsed
    pub text: String,

    /// h1-h3 headings in document order
    pub headings: Vec<String>,

    /// All links found on the page (absolute URLs)
    pub links: Vec<String>,

    /// Allow-listed structured-data records
    pub structured_data: Vec<Value>,

    /// Short quoted testimonials
    pub testimonials: Vec<String>,

    /// Award and certification mentions
    pub awards: Vec<String>,
}

/// Parses HTML content and extracts page content and metadata
///
/// # Link Extraction Rules
///
/// **Include:** `<a href="...">` anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links (same-page anchors)
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
/// * `allowed_types` - schema.org types kept from JSON-LD
///
/// # Returns
///
/// * `Ok(ParsedPage)` - Successfully parsed page
/// * `Err(String)` - The document has no content to parse
///
/// # Example
///
/// ```
/// use directory_harvester::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Cafe</title></head><body><a href="/menu">Menu</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, &[]).unwrap();
/// assert_eq!(parsed.title, Some("Cafe".to_string()));
/// assert_eq!(parsed.links, vec!["https://example.com/menu".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url, allowed_types: &[String]) -> Result<ParsedPage, String> {
    if html.trim().is_empty() {
        return Err("empty document".to_string());
    }

    let document = Html::parse_document(html);
    let text = extract_visible_text(&document);

    Ok(ParsedPage {
        title: extract_title(&document),
        description: extract_description(&document),
        language: extract_language(&document),
        headings: extract_headings(&document),
        links: extract_links(&document, base_url),
        structured_data: extract_structured_data(&document, allowed_types),
        testimonials: extract_testimonials(&document),
        awards: extract_awards(&text),
        text,
    })
}

/// Collapses runs of whitespace into single spaces
fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|e| e.value().attr(attr))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element_text(&element))
        .filter(|s| !s.is_empty())
}

fn extract_description(document: &Html) -> Option<String> {
    first_attr(document, "meta[name='description']", "content")
        .or_else(|| first_attr(document, "meta[property='og:description']", "content"))
}

fn extract_language(document: &Html) -> Option<String> {
    first_attr(document, "html[lang]", "lang")
        .or_else(|| first_attr(document, "meta[http-equiv='content-language']", "content"))
}

/// Collects text nodes that are not inside script/style-like elements
fn extract_visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                .unwrap_or(false)
        });

        if !hidden {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }

    collapse_whitespace(&parts.join(" "))
}

fn extract_headings(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("h1, h2, h3") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|e| element_text(&e))
        .filter(|s| !s.is_empty())
        .take(MAX_HEADINGS)
        .collect()
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}

/// Parses JSON-LD blocks and keeps records whose @type is allow-listed
///
/// Arrays and `@graph` containers are flattened first.
fn extract_structured_data(document: &Html, allowed_types: &[String]) -> Vec<Value> {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for element in document.select(&selector) {
        let raw = element.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => flatten_json_ld(value, &mut records),
            Err(e) => tracing::debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }

    records
        .into_iter()
        .filter(|record| type_is_allowed(record, allowed_types))
        .collect()
}

fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_json_ld(item, out);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            if map.contains_key("@type") {
                out.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// Checks a record's @type (string or array) against the allow-list
///
/// An empty allow-list keeps every typed record.
pub fn type_is_allowed(record: &Value, allowed_types: &[String]) -> bool {
    if allowed_types.is_empty() {
        return record.get("@type").is_some();
    }

    let matches = |t: &str| {
        let short = t.rsplit('/').next().unwrap_or(t);
        allowed_types.iter().any(|allowed| allowed.eq_ignore_ascii_case(short))
    };

    match record.get("@type") {
        Some(Value::String(t)) => matches(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

fn extract_testimonials(document: &Html) -> Vec<String> {
    let Ok(selector) =
        Selector::parse("blockquote, q, [class*='testimonial'], [class*='review']")
    else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut testimonials = Vec::new();

    for element in document.select(&selector) {
        let text = element_text(&element);
        let length = text.chars().count();
        if !(TESTIMONIAL_MIN_CHARS..=TESTIMONIAL_MAX_CHARS).contains(&length) {
            continue;
        }
        if seen.insert(text.to_lowercase()) {
            testimonials.push(text);
        }
        if testimonials.len() >= MAX_SIGNALS_PER_PAGE {
            break;
        }
    }

    testimonials
}

/// Picks sentences from the visible text that mention awards or certifications
fn extract_awards(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut awards = Vec::new();

    for sentence in text.split(['.', '!', '?', '|', '\n']) {
        let sentence = sentence.trim();
        if sentence.is_empty() || sentence.chars().count() > AWARD_MAX_CHARS {
            continue;
        }

        let lowered = sentence.to_lowercase();
        if AWARD_KEYWORDS.iter().any(|k| lowered.contains(k)) && seen.insert(lowered) {
            awards.push(sentence.to_string());
        }

        if awards.len() >= MAX_SIGNALS_PER_PAGE {
            break;
        }
    }

    awards
}
