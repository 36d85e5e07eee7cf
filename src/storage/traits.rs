//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{BusinessStatus, CrawlStatus};
use crate::storage::{
    BusinessCounts, BusinessRecord, CrawlRecord, InsertOutcome, NewBusiness, ScrapeJobOutcome,
    ScrapeJobRecord, StatusAdvance, TransitionOutcome,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Discovery crawl not found: {0}")]
    CrawlNotFound(String),

    #[error("Business not found: {0}")]
    BusinessNotFound(i64),

    #[error("Scrape job not found: {0}")]
    ScrapeJobNotFound(i64),

    #[error("Invalid transition for crawl {crawl_id}: {from} -> {to}")]
    InvalidTransition {
        crawl_id: String,
        from: CrawlStatus,
        to: CrawlStatus,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true for infrastructure failures a retry may get past
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Sqlite(_) | Self::Io(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Lifecycle transitions are conditional: each one reads the stored status,
/// rejects transitions the lifecycle forbids, and only writes when the record
/// is still in the expected predecessor state. A transition that lost a race
/// reports `TransitionOutcome::Stale` and writes nothing.
pub trait Storage {
    // ===== Discovery Crawl Lifecycle =====

    /// Creates a new discovery crawl in the `crawling` state
    ///
    /// # Arguments
    ///
    /// * `seed_urls` - Seed URLs, in crawl order
    /// * `max_pages` - Page budget for the whole crawl
    /// * `region_id` - Region the crawl belongs to
    /// * `city_id` - Optional city within the region
    ///
    /// # Returns
    ///
    /// The opaque crawl id
    fn create_crawl(
        &mut self,
        seed_urls: &[String],
        max_pages: u32,
        region_id: i64,
        city_id: Option<i64>,
    ) -> StorageResult<String>;

    /// Gets a crawl by id
    fn get_crawl(&self, crawl_id: &str) -> StorageResult<CrawlRecord>;

    /// Raises `pages_crawled` while the crawl is still fetching; never lowers it
    fn record_pages_crawled(&mut self, crawl_id: &str, pages_crawled: u32) -> StorageResult<()>;

    /// `crawling → crawled`: records the final page count and `crawl_finished_at`
    fn mark_crawled(&mut self, crawl_id: &str, pages_crawled: u32)
        -> StorageResult<TransitionOutcome>;

    /// `crawled → processing`: records `processing_started_at`
    fn mark_processing(&mut self, crawl_id: &str) -> StorageResult<TransitionOutcome>;

    /// `processing → completed`: records business counts and `completed_at`
    fn mark_completed(
        &mut self,
        crawl_id: &str,
        counts: BusinessCounts,
    ) -> StorageResult<TransitionOutcome>;

    /// `crawling | processing → failed`: records the error and `completed_at`
    fn mark_failed(&mut self, crawl_id: &str, error: &str) -> StorageResult<TransitionOutcome>;

    /// Recovery `processing → crawled` for an interrupted extraction run
    fn reset_to_crawled(
        &mut self,
        crawl_id: &str,
        pages_crawled: u32,
    ) -> StorageResult<TransitionOutcome>;

    /// Gets all crawls whose status is not terminal, oldest first
    fn find_incomplete_crawls(&self) -> StorageResult<Vec<CrawlRecord>>;

    // ===== Scrape Job Audit =====

    /// Creates a scrape job in the `running` state
    fn create_scrape_job(&mut self, source: &str, query: &str) -> StorageResult<i64>;

    /// Gets a scrape job by id
    fn get_scrape_job(&self, job_id: i64) -> StorageResult<ScrapeJobRecord>;

    /// Writes the terminal outcome of a scrape job
    ///
    /// Returns false if the job already had a terminal outcome.
    fn finish_scrape_job(&mut self, job_id: i64, outcome: &ScrapeJobOutcome)
        -> StorageResult<bool>;

    // ===== Businesses =====

    /// Inserts a business unless one with the same source key exists
    fn insert_business_if_absent(&mut self, business: &NewBusiness) -> StorageResult<InsertOutcome>;

    /// Gets a business by id
    fn get_business(&self, business_id: i64) -> StorageResult<BusinessRecord>;

    /// Moves a business at most one step toward `target`
    ///
    /// Businesses already at or beyond `target`, and failed businesses, are
    /// left untouched.
    fn advance_business_status(
        &mut self,
        business_id: i64,
        target: BusinessStatus,
    ) -> StorageResult<StatusAdvance>;

    /// Moves a business into the absorbing `failed` state
    ///
    /// Returns false if the business was already failed or verified.
    fn fail_business(&mut self, business_id: i64, error: &str) -> StorageResult<bool>;

    /// Gets businesses due for enrichment
    ///
    /// Either `researched`, or still short of it without a website and
    /// unchanged since before `pending_cutoff`. The second group never gets a
    /// website crawl to move it along, so each sweep steps it forward once.
    fn find_enrich_candidates(
        &self,
        pending_cutoff: DateTime<Utc>,
    ) -> StorageResult<Vec<BusinessRecord>>;

    // ===== Statistics =====

    /// Counts crawls by status
    fn count_crawls_by_status(&self, status: CrawlStatus) -> StorageResult<u64>;

    /// Sums `pages_crawled` across all crawls
    fn count_total_pages_crawled(&self) -> StorageResult<u64>;

    /// Counts businesses by status
    fn count_businesses_by_status(&self, status: BusinessStatus) -> StorageResult<u64>;
}
