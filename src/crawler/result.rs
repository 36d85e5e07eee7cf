//! Crawl results: per-page records, the per-site aggregate and its JSON summary

use crate::crawler::parser::ParsedPage;
use crate::url::signals_english;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Maximum testimonials or awards kept in a site aggregate
pub const MAX_SOCIAL_PROOF: usize = 10;

/// One fetched page's extraction result
///
/// Written once as a `page_NNNN.json` artifact during discovery crawls and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledPage {
    pub url: String,
    pub status_code: u16,
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    /// Visible text length in characters
    pub content_length: usize,
    pub headings: Vec<String>,
    pub content: String,
    #[serde(default)]
    pub structured_data: Vec<Value>,
    #[serde(default)]
    pub testimonials: Vec<String>,
    #[serde(default)]
    pub awards: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl CrawledPage {
    pub fn from_parsed(url: String, status_code: u16, parsed: ParsedPage) -> Self {
        Self {
            url,
            status_code,
            content_length: parsed.text.chars().count(),
            title: parsed.title,
            description: parsed.description,
            language: parsed.language,
            headings: parsed.headings,
            content: parsed.text,
            structured_data: parsed.structured_data,
            testimonials: parsed.testimonials,
            awards: parsed.awards,
            links: parsed.links,
        }
    }

    /// Returns true if the page URL or its declared language signals English
    pub fn signals_english(&self) -> bool {
        signals_english(&self.url, self.language.as_deref())
    }
}

/// Aggregate of one site crawl
#[derive(Debug, Clone, Default)]
pub struct SiteCrawlResult {
    /// Pages in fetch order; the seed is first
    pub pages: Vec<CrawledPage>,
    pub has_english_version: bool,
    pub total_content_length: usize,
    /// Distinct declared languages, in order of first appearance
    pub languages: Vec<String>,
    pub structured_data: Vec<Value>,
    pub testimonials: Vec<String>,
    pub awards: Vec<String>,
}

impl SiteCrawlResult {
    /// Result for a target that served nothing usable
    pub fn empty() -> Self {
        Self::default()
    }

    /// Aggregates fetched pages into a site result
    pub fn from_pages(pages: Vec<CrawledPage>) -> Self {
        let mut languages: Vec<String> = Vec::new();
        let mut structured_data = Vec::new();
        let mut seen_records = HashSet::new();
        let mut testimonials = Vec::new();
        let mut awards = Vec::new();
        let mut seen_testimonials = HashSet::new();
        let mut seen_awards = HashSet::new();

        for page in &pages {
            if let Some(lang) = &page.language {
                let lang = lang.to_lowercase();
                if !languages.contains(&lang) {
                    languages.push(lang);
                }
            }

            for record in &page.structured_data {
                if seen_records.insert(record.to_string()) {
                    structured_data.push(record.clone());
                }
            }

            for t in &page.testimonials {
                if testimonials.len() < MAX_SOCIAL_PROOF && seen_testimonials.insert(t.to_lowercase()) {
                    testimonials.push(t.clone());
                }
            }

            for a in &page.awards {
                if awards.len() < MAX_SOCIAL_PROOF && seen_awards.insert(a.to_lowercase()) {
                    awards.push(a.clone());
                }
            }
        }

        Self {
            has_english_version: pages.iter().any(CrawledPage::signals_english),
            total_content_length: pages.iter().map(|p| p.content_length).sum(),
            pages,
            languages,
            structured_data,
            testimonials,
            awards,
        }
    }

    pub fn pages_crawled(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Builds the summary document stored as `summary.json`
    ///
    /// Page content is truncated to `excerpt_chars` characters.
    pub fn summary(&self, excerpt_chars: usize) -> SiteSummary {
        let title = self.pages.iter().find_map(|p| p.title.clone());
        let description = self.pages.iter().find_map(|p| p.description.clone());

        let social_proof = if self.testimonials.is_empty() && self.awards.is_empty() {
            None
        } else {
            Some(SocialProof {
                testimonials: self.testimonials.clone(),
                awards: self.awards.clone(),
            })
        };

        SiteSummary {
            pages_crawled: self.pages_crawled(),
            has_english_version: self.has_english_version,
            total_content_length: self.total_content_length,
            metadata: SummaryMetadata {
                title,
                description,
                languages_detected: self.languages.clone(),
            },
            structured_data: if self.structured_data.is_empty() {
                None
            } else {
                Some(self.structured_data.clone())
            },
            social_proof,
            pages: self
                .pages
                .iter()
                .map(|p| PageSummary::from_page(p, excerpt_chars))
                .collect(),
        }
    }
}

/// Summary JSON document for one crawled site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub pages_crawled: usize,
    pub has_english_version: bool,
    pub total_content_length: usize,
    pub metadata: SummaryMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_proof: Option<SocialProof>,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub languages_detected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialProof {
    pub testimonials: Vec<String>,
    pub awards: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSummary {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub content_length: usize,
    pub headings: Vec<String>,
    pub content: String,
}

impl PageSummary {
    fn from_page(page: &CrawledPage, excerpt_chars: usize) -> Self {
        Self {
            url: page.url.clone(),
            title: page.title.clone(),
            description: page.description.clone(),
            language: page.language.clone(),
            content_length: page.content_length,
            headings: page.headings.clone(),
            content: page.content.chars().take(excerpt_chars).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(url: &str) -> CrawledPage {
        CrawledPage {
            url: url.to_string(),
            status_code: 200,
            title: None,
            description: None,
            language: None,
            content_length: 0,
            headings: Vec::new(),
            content: String::new(),
            structured_data: Vec::new(),
            testimonials: Vec::new(),
            awards: Vec::new(),
            links: Vec::new(),
        }
    }

    #[test]
    fn test_empty_result_summary() {
        let summary = SiteCrawlResult::empty().summary(100);
        assert_eq!(summary.pages_crawled, 0);
        assert!(!summary.has_english_version);
        assert!(summary.pages.is_empty());
        assert!(summary.structured_data.is_none());
        assert!(summary.social_proof.is_none());
    }

    #[test]
    fn test_aggregates_lengths_and_languages() {
        let mut home = page("https://example.de/");
        home.content_length = 120;
        home.language = Some("de".to_string());
        home.title = Some("Gasthaus".to_string());
        let mut about = page("https://example.de/ueber-uns");
        about.content_length = 80;
        about.language = Some("DE".to_string());

        let result = SiteCrawlResult::from_pages(vec![home, about]);
        assert_eq!(result.pages_crawled(), 2);
        assert_eq!(result.total_content_length, 200);
        assert_eq!(result.languages, vec!["de".to_string()]);
        assert!(!result.has_english_version);
        assert_eq!(result.summary(10).metadata.title, Some("Gasthaus".to_string()));
    }

    #[test]
    fn test_english_version_detected_from_url() {
        let result = SiteCrawlResult::from_pages(vec![
            page("https://example.de/"),
            page("https://example.de/en/about"),
        ]);
        assert!(result.has_english_version);
    }

    #[test]
    fn test_structured_data_deduplicated() {
        let record = json!({"@type": "Restaurant", "name": "Roma"});
        let mut a = page("https://example.com/");
        a.structured_data = vec![record.clone()];
        let mut b = page("https://example.com/contact");
        b.structured_data = vec![record];

        let result = SiteCrawlResult::from_pages(vec![a, b]);
        assert_eq!(result.structured_data.len(), 1);
    }

    #[test]
    fn test_social_proof_capped() {
        let pages: Vec<CrawledPage> = (0..3)
            .map(|i| {
                let mut p = page(&format!("https://example.com/{}", i));
                p.testimonials = (0..5).map(|j| format!("Great place number {} {}", i, j)).collect();
                p.awards = vec!["Award winner 2020".to_string()];
                p
            })
            .collect();

        let result = SiteCrawlResult::from_pages(pages);
        assert_eq!(result.testimonials.len(), MAX_SOCIAL_PROOF);
        assert_eq!(result.awards, vec!["Award winner 2020".to_string()]);
    }

    #[test]
    fn test_summary_truncates_content() {
        let mut p = page("https://example.com/");
        p.content = "abcdefghij".to_string();
        p.content_length = 10;

        let summary = SiteCrawlResult::from_pages(vec![p]).summary(4);
        assert_eq!(summary.pages[0].content, "abcd");
        assert_eq!(summary.pages[0].content_length, 10);
    }

    #[test]
    fn test_summary_json_field_names() {
        let summary = SiteCrawlResult::from_pages(vec![page("https://example.com/")]).summary(10);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["pages_crawled"], 1);
        assert!(value["metadata"]["languages_detected"].is_array());
        assert!(value.get("structured_data").is_none());
    }
}
