//! Site crawler: drives the fetcher, parser and prioritizer across one target
//!
//! Fetches are strictly sequential with a politeness delay between requests.
//! The seed page must succeed; any other page that fails is skipped.

use crate::config::{Config, PriorityTable};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::parser::parse_html;
use crate::crawler::prioritizer::{Prioritizer, VisitedUrls};
use crate::crawler::result::{CrawledPage, SiteCrawlResult};
use crate::HarvestError;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Per-run crawl limits
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Page budget including the seed
    pub max_pages: usize,
    pub politeness_delay: Duration,
    pub structured_data_types: Vec<String>,
}

impl CrawlOptions {
    pub fn from_config(config: &Config, max_pages: u32) -> Self {
        Self {
            max_pages: max_pages as usize,
            politeness_delay: Duration::from_millis(config.fetcher.politeness_delay_ms),
            structured_data_types: config.crawler.structured_data_types.clone(),
        }
    }
}

/// Receives each page as soon as it has been fetched and parsed
pub trait PageSink: Send {
    fn accept(&mut self, page: &CrawledPage) -> crate::Result<()>;
}

/// Sink that keeps nothing beyond the aggregate result
pub struct NullSink;

impl PageSink for NullSink {
    fn accept(&mut self, _page: &CrawledPage) -> crate::Result<()> {
        Ok(())
    }
}

/// Why a site crawl produced no result
#[derive(Debug, Error)]
pub enum CrawlFailure {
    /// The seed answered permanently with nothing usable (404, non-HTML, empty)
    #[error("no usable content at seed {url}: {reason}")]
    NoSeedContent { url: String, reason: String },

    /// The seed could not be reached; a later attempt may succeed
    #[error("seed unreachable: {0}")]
    Transport(FetchError),

    /// The page sink refused a page
    #[error("failed to store page: {0}")]
    Sink(Box<HarvestError>),
}

impl From<CrawlFailure> for HarvestError {
    fn from(failure: CrawlFailure) -> Self {
        match failure {
            CrawlFailure::NoSeedContent { url, reason } => HarvestError::NoSeedContent { url, reason },
            CrawlFailure::Transport(e) => HarvestError::Fetch(e),
            CrawlFailure::Sink(e) => *e,
        }
    }
}

/// Crawls one target site within a page budget
pub struct SiteCrawler {
    fetcher: Fetcher,
    priorities: Arc<PriorityTable>,
    options: CrawlOptions,
}

impl SiteCrawler {
    pub fn new(fetcher: Fetcher, priorities: Arc<PriorityTable>, options: CrawlOptions) -> Self {
        Self {
            fetcher,
            priorities,
            options,
        }
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Crawls the target and aggregates every page fetched
    ///
    /// Each page is handed to `sink` right after it is parsed.
    pub async fn crawl(
        &self,
        target: &Url,
        sink: &mut dyn PageSink,
    ) -> Result<SiteCrawlResult, CrawlFailure> {
        let mut visited = VisitedUrls::new();
        self.crawl_with_visited(target, sink, &mut visited).await
    }

    /// Crawls the target, skipping anything already in `visited`
    ///
    /// # Algorithm
    ///
    /// 1. Return an empty result if the target itself was already visited
    /// 2. Fetch and parse the seed; failure aborts the crawl
    /// 3. Prioritize the seed's same-host links not yet visited, capped at
    ///    `max_pages - 1`
    /// 4. Fetch the frontier in order, sleeping between requests
    /// 5. Aggregate the pages
    ///
    /// Every URL fetched or queued is added to `visited`, so later targets of
    /// the same crawl never fetch it again.
    pub async fn crawl_with_visited(
        &self,
        target: &Url,
        sink: &mut dyn PageSink,
        visited: &mut VisitedUrls,
    ) -> Result<SiteCrawlResult, CrawlFailure> {
        if self.options.max_pages == 0 {
            return Ok(SiteCrawlResult::empty());
        }
        if visited.contains(target) {
            tracing::debug!("Skipping {}: already visited in this crawl", target);
            return Ok(SiteCrawlResult::empty());
        }

        tracing::info!("Crawling {} (budget {} pages)", target, self.options.max_pages);

        let (seed_page, seed_url) = self.fetch_seed(target).await?;
        sink.accept(&seed_page).map_err(|e| CrawlFailure::Sink(Box::new(e)))?;

        let frontier = {
            let mut prioritizer = Prioritizer::new(seed_url.clone(), &self.priorities, visited);
            prioritizer.mark_seen(target);
            prioritizer.mark_seen(&seed_url);
            prioritizer.prioritize(&seed_page.links, self.options.max_pages - 1)
        };
        tracing::debug!(
            "Seed {} yielded {} candidate links",
            seed_url,
            frontier.len()
        );

        let mut pages = vec![seed_page];

        for candidate in frontier {
            tokio::time::sleep(self.options.politeness_delay).await;

            match self.fetch_page(&candidate.url).await {
                Ok((page, final_url)) => {
                    // redirects land on URLs the frontier never saw
                    visited.insert(&final_url);
                    sink.accept(&page).map_err(|e| CrawlFailure::Sink(Box::new(e)))?;
                    pages.push(page);
                }
                Err(reason) => {
                    tracing::warn!("Skipping {}: {}", candidate.url, reason);
                }
            }
        }

        let result = SiteCrawlResult::from_pages(pages);
        tracing::info!(
            "Crawled {}: {} pages, {} chars of text",
            target,
            result.pages_crawled(),
            result.total_content_length
        );
        Ok(result)
    }

    async fn fetch_seed(&self, target: &Url) -> Result<(CrawledPage, Url), CrawlFailure> {
        let fetched = self.fetcher.fetch(target).await.map_err(|e| {
            if e.is_permanent() {
                CrawlFailure::NoSeedContent {
                    url: target.to_string(),
                    reason: e.to_string(),
                }
            } else {
                CrawlFailure::Transport(e)
            }
        })?;

        let parsed = parse_html(&fetched.html, &fetched.final_url, &self.options.structured_data_types)
            .map_err(|reason| CrawlFailure::NoSeedContent {
                url: target.to_string(),
                reason,
            })?;

        let page = CrawledPage::from_parsed(fetched.final_url.to_string(), fetched.status_code, parsed);
        Ok((page, fetched.final_url))
    }

    async fn fetch_page(&self, url: &Url) -> Result<(CrawledPage, Url), String> {
        let fetched = self.fetcher.fetch(url).await.map_err(|e| e.to_string())?;
        let parsed = parse_html(&fetched.html, &fetched.final_url, &self.options.structured_data_types)?;
        let page = CrawledPage::from_parsed(fetched.final_url.to_string(), fetched.status_code, parsed);
        Ok((page, fetched.final_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_failure_converts_to_harvest_error() {
        let err: HarvestError = CrawlFailure::NoSeedContent {
            url: "https://example.com/".to_string(),
            reason: "HTTP 404".to_string(),
        }
        .into();
        assert!(matches!(err, HarvestError::NoSeedContent { .. }));
        assert!(!err.is_retryable());

        let err: HarvestError = CrawlFailure::Transport(FetchError::Transport {
            url: "https://example.com/".to_string(),
            message: "timeout".to_string(),
        })
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_null_sink_accepts() {
        let page = CrawledPage::from_parsed(
            "https://example.com/".to_string(),
            200,
            Default::default(),
        );
        assert!(NullSink.accept(&page).is_ok());
    }
}
