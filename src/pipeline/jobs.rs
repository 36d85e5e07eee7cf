//! Job payloads consumed from the queue
//!
//! Every job carries only identifiers; handlers reload state from storage.

use crate::pipeline::stage::Stage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named worker pools with independent concurrency limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    /// Network-heavy work against third-party sites
    Scraper,
    /// Calls to external research services
    Research,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraper => "scraper",
            Self::Research => "research",
        }
    }

    pub fn all() -> [QueueName; 2] {
        [Self::Scraper, Self::Research]
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of queued work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Search an external places source and create businesses
    Discovery {
        query: String,
        city_id: Option<i64>,
        category_id: Option<i64>,
    },
    /// Fetch the seed URLs of a discovery crawl
    CrawlDiscovery { crawl_id: String },
    /// Extract businesses from a crawled discovery crawl
    ProcessCrawl { crawl_id: String },
    WebsiteCrawl { business_id: i64 },
    WebSearch { business_id: i64 },
    Enrich { business_id: i64 },
    Translate { business_id: i64 },
}

impl Job {
    /// Builds the job that runs `stage` for a business
    ///
    /// Discovery is not per-business, so it has no such job.
    pub fn for_stage(stage: Stage, business_id: i64) -> Option<Job> {
        match stage {
            Stage::Discovery => None,
            Stage::WebsiteCrawl => Some(Job::WebsiteCrawl { business_id }),
            Stage::WebSearch => Some(Job::WebSearch { business_id }),
            Stage::Enrich => Some(Job::Enrich { business_id }),
            Stage::Translate => Some(Job::Translate { business_id }),
        }
    }

    /// The per-business stage and business id, if this is a stage job
    pub fn business_stage(&self) -> Option<(Stage, i64)> {
        match self {
            Job::WebsiteCrawl { business_id } => Some((Stage::WebsiteCrawl, *business_id)),
            Job::WebSearch { business_id } => Some((Stage::WebSearch, *business_id)),
            Job::Enrich { business_id } => Some((Stage::Enrich, *business_id)),
            Job::Translate { business_id } => Some((Stage::Translate, *business_id)),
            Job::Discovery { .. } | Job::CrawlDiscovery { .. } | Job::ProcessCrawl { .. } => None,
        }
    }

    /// The discovery crawl this job drives, if any
    pub fn crawl_id(&self) -> Option<&str> {
        match self {
            Job::CrawlDiscovery { crawl_id } | Job::ProcessCrawl { crawl_id } => Some(crawl_id),
            _ => None,
        }
    }

    pub fn job_type(&self) -> &'static str {
        match self {
            Job::Discovery { .. } => "discovery",
            Job::CrawlDiscovery { .. } => "crawl_discovery",
            Job::ProcessCrawl { .. } => "process_crawl",
            Job::WebsiteCrawl { .. } => "website_crawl",
            Job::WebSearch { .. } => "web_search",
            Job::Enrich { .. } => "enrich",
            Job::Translate { .. } => "translate",
        }
    }

    pub fn queue(&self) -> QueueName {
        match self {
            Job::Discovery { .. }
            | Job::CrawlDiscovery { .. }
            | Job::ProcessCrawl { .. }
            | Job::WebsiteCrawl { .. } => QueueName::Scraper,
            Job::WebSearch { .. } | Job::Enrich { .. } | Job::Translate { .. } => {
                QueueName::Research
            }
        }
    }

    /// Argument-based deduplication key
    ///
    /// Only one pending or running job may exist per key.
    pub fn dedup_key(&self) -> String {
        match self {
            Job::Discovery {
                query,
                city_id,
                category_id,
            } => format!(
                "discovery:{}:{}:{}",
                query.trim().to_lowercase(),
                city_id.map(|c| c.to_string()).unwrap_or_default(),
                category_id.map(|c| c.to_string()).unwrap_or_default()
            ),
            Job::CrawlDiscovery { crawl_id } | Job::ProcessCrawl { crawl_id } => {
                format!("{}:{}", self.job_type(), crawl_id)
            }
            Job::WebsiteCrawl { business_id }
            | Job::WebSearch { business_id }
            | Job::Enrich { business_id }
            | Job::Translate { business_id } => format!("{}:{}", self.job_type(), business_id),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dedup_key())
    }
}
