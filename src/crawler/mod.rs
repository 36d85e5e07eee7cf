//! Crawler module for per-site page fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with failure classification
//! - HTML parsing (content, metadata, structured data, social proof)
//! - Link prioritization and deduplication
//! - Sequential, budgeted crawling of one target site

mod fetcher;
mod parser;
mod prioritizer;
mod result;
mod site;

pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher};
pub use parser::{parse_html, type_is_allowed, ParsedPage, MAX_HEADINGS};
pub use prioritizer::{Prioritizer, ScoredLink, VisitedUrls};
pub use result::{
    CrawledPage, PageSummary, SiteCrawlResult, SiteSummary, SocialProof, SummaryMetadata,
    MAX_SOCIAL_PROOF,
};
pub use site::{CrawlFailure, CrawlOptions, NullSink, PageSink, SiteCrawler};

use crate::config::{Config, PriorityTableCache};
use crate::HarvestError;
use url::Url;

/// Crawls a single site with settings from the configuration
///
/// This is the entry point for one-off crawls. It will:
/// 1. Build the HTTP client
/// 2. Load the priority table
/// 3. Crawl up to `crawler.site-max-pages` pages
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `target` - The site to crawl
///
/// # Returns
///
/// * `Ok(SiteCrawlResult)` - Crawl finished (possibly with skipped pages)
/// * `Err(HarvestError)` - The seed could not be fetched
pub async fn crawl_site(config: &Config, target: &Url) -> Result<SiteCrawlResult, HarvestError> {
    let fetcher = Fetcher::new(&config.fetcher, &config.user_agent)?;
    let priorities = PriorityTableCache::from_config(config).get()?;
    let options = CrawlOptions::from_config(config, config.crawler.site_max_pages);

    let crawler = SiteCrawler::new(fetcher, priorities, options);
    Ok(crawler.crawl(target, &mut NullSink).await?)
}
