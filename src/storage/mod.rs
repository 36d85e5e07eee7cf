//! Storage module for persisting pipeline state
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - The discovery crawl lifecycle (conditional state transitions)
//! - The API scrape audit trail
//! - Businesses and their coarse pipeline status

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{BusinessStatus, CrawlStatus};
use crate::url::{dedup_key_for, parse_website};
use crate::HarvestError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Formats a timestamp the way every table stores it
///
/// Fixed precision and a `Z` suffix keep stored values lexically comparable.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Represents a discovery crawl in the database
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRecord {
    pub crawl_id: String,
    pub status: CrawlStatus,
    pub seed_urls: Vec<String>,
    pub max_pages: u32,
    pub pages_crawled: u32,
    pub businesses_created: u32,
    pub businesses_skipped: u32,
    pub businesses_failed: u32,
    pub error: Option<String>,
    pub region_id: i64,
    pub city_id: Option<i64>,
    pub started_at: String,
    pub crawl_finished_at: Option<String>,
    pub processing_started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// Business counts recorded when extraction completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusinessCounts {
    pub created: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Result of a conditional lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The record moved to the requested status
    Applied,
    /// Another task already moved the record; nothing was written
    Stale { current: CrawlStatus },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Status of an API scrape attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScrapeJobStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Represents an API scrape attempt in the database
#[derive(Debug, Clone)]
pub struct ScrapeJobRecord {
    pub id: i64,
    pub source: String,
    pub query: String,
    pub status: ScrapeJobStatus,
    pub businesses_found: u32,
    pub businesses_created: u32,
    pub error: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

/// Terminal outcome written to a scrape job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeJobOutcome {
    Completed { found: u32, created: u32 },
    Failed { error: String, found: u32, created: u32 },
}

/// Represents a business in the database
#[derive(Debug, Clone)]
pub struct BusinessRecord {
    pub id: i64,
    pub name: String,
    pub website: Option<String>,
    pub city_id: Option<i64>,
    pub category_id: Option<i64>,
    pub status: BusinessStatus,
    pub source_key: String,
    pub error: Option<String>,
    pub created_at: String,
    pub status_changed_at: String,
}

/// A business candidate produced by a discovery source
#[derive(Debug, Clone, PartialEq)]
pub struct NewBusiness {
    pub name: String,
    pub website: Option<String>,
    pub city_id: Option<i64>,
    pub category_id: Option<i64>,
}

impl NewBusiness {
    /// Identity used to make business creation idempotent
    ///
    /// The normalized website when there is one, otherwise name and city.
    pub fn source_key(&self) -> String {
        let website_key = self
            .website
            .as_deref()
            .and_then(parse_website)
            .and_then(|url| dedup_key_for(&url).ok());

        match website_key {
            Some(key) => format!("web:{}", key),
            None => format!(
                "name:{}|city:{}",
                self.name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase(),
                self.city_id.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
            ),
        }
    }
}

/// Result of an idempotent business insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i64),
    Existing(i64),
}

impl InsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            Self::Created(id) | Self::Existing(id) => *id,
        }
    }
}

/// Result of asking a business to move toward a target status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAdvance {
    Advanced {
        from: BusinessStatus,
        to: BusinessStatus,
    },
    Unchanged(BusinessStatus),
}
