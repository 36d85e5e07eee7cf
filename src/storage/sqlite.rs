//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{BusinessStatus, CrawlStatus, TransitionCheck};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, now_timestamp, BusinessCounts, BusinessRecord, CrawlRecord, InsertOutcome,
    NewBusiness, ScrapeJobOutcome, ScrapeJobRecord, ScrapeJobStatus, StatusAdvance,
    TransitionOutcome,
};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const CRAWL_COLUMNS: &str = "crawl_id, status, seed_urls, max_pages, pages_crawled,
     businesses_created, businesses_skipped, businesses_failed, error, region_id, city_id,
     started_at, crawl_finished_at, processing_started_at, completed_at";

const BUSINESS_COLUMNS: &str = "id, name, website, city_id, category_id, status, source_key,
     error, created_at, status_changed_at";

/// Whether a transition may be written, decided from the stored status
enum Gate {
    Apply(CrawlStatus),
    Skip(CrawlStatus),
}

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn crawl_status(&self, crawl_id: &str) -> StorageResult<CrawlStatus> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM discovery_crawls WHERE crawl_id = ?1",
                params![crawl_id],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or_else(|| StorageError::CrawlNotFound(crawl_id.to_string()))?;
        CrawlStatus::from_db_string(&raw)
            .ok_or_else(|| StorageError::Serialization(format!("unknown crawl status '{}'", raw)))
    }

    /// Checks a requested transition against the stored status
    fn gate(&self, crawl_id: &str, to: CrawlStatus, recovery: bool) -> StorageResult<Gate> {
        let current = self.crawl_status(crawl_id)?;
        match current.check_transition(to, recovery) {
            TransitionCheck::Apply => Ok(Gate::Apply(current)),
            TransitionCheck::Stale => {
                tracing::debug!(
                    "Crawl {} already {}, skipping transition to {}",
                    crawl_id,
                    current,
                    to
                );
                Ok(Gate::Skip(current))
            }
            TransitionCheck::Invalid => Err(StorageError::InvalidTransition {
                crawl_id: crawl_id.to_string(),
                from: current,
                to,
            }),
        }
    }

    /// Turns the row count of a conditional update into an outcome
    fn settle(
        &self,
        crawl_id: &str,
        from: CrawlStatus,
        to: CrawlStatus,
        changed: usize,
    ) -> StorageResult<TransitionOutcome> {
        if changed == 1 {
            tracing::info!("Crawl {}: {} -> {}", crawl_id, from, to);
            return Ok(TransitionOutcome::Applied);
        }

        let current = self.crawl_status(crawl_id)?;
        tracing::warn!(
            "Crawl {} moved from {} to {} concurrently; {} -> {} not applied",
            crawl_id,
            from,
            current,
            from,
            to
        );
        Ok(TransitionOutcome::Stale { current })
    }

    fn business_status(&self, business_id: i64) -> StorageResult<BusinessStatus> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM businesses WHERE id = ?1",
                params![business_id],
                |row| row.get(0),
            )
            .optional()?;

        let raw = raw.ok_or(StorageError::BusinessNotFound(business_id))?;
        BusinessStatus::from_db_string(&raw)
            .ok_or_else(|| StorageError::Serialization(format!("unknown business status '{}'", raw)))
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        Type::Text,
        Box::new(StorageError::Serialization(message)),
    )
}

fn crawl_from_row(row: &Row<'_>) -> rusqlite::Result<CrawlRecord> {
    let status: String = row.get(1)?;
    let seeds: String = row.get(2)?;

    Ok(CrawlRecord {
        crawl_id: row.get(0)?,
        status: CrawlStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(1, format!("unknown crawl status '{}'", status)))?,
        seed_urls: serde_json::from_str(&seeds)
            .map_err(|e| conversion_error(2, format!("bad seed list: {}", e)))?,
        max_pages: row.get(3)?,
        pages_crawled: row.get(4)?,
        businesses_created: row.get(5)?,
        businesses_skipped: row.get(6)?,
        businesses_failed: row.get(7)?,
        error: row.get(8)?,
        region_id: row.get(9)?,
        city_id: row.get(10)?,
        started_at: row.get(11)?,
        crawl_finished_at: row.get(12)?,
        processing_started_at: row.get(13)?,
        completed_at: row.get(14)?,
    })
}

fn business_from_row(row: &Row<'_>) -> rusqlite::Result<BusinessRecord> {
    let status: String = row.get(5)?;

    Ok(BusinessRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        website: row.get(2)?,
        city_id: row.get(3)?,
        category_id: row.get(4)?,
        status: BusinessStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(5, format!("unknown business status '{}'", status)))?,
        source_key: row.get(6)?,
        error: row.get(7)?,
        created_at: row.get(8)?,
        status_changed_at: row.get(9)?,
    })
}

fn scrape_job_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapeJobRecord> {
    let status: String = row.get(3)?;

    Ok(ScrapeJobRecord {
        id: row.get(0)?,
        source: row.get(1)?,
        query: row.get(2)?,
        status: ScrapeJobStatus::from_db_string(&status)
            .ok_or_else(|| conversion_error(3, format!("unknown scrape job status '{}'", status)))?,
        businesses_found: row.get(4)?,
        businesses_created: row.get(5)?,
        error: row.get(6)?,
        created_at: row.get(7)?,
        started_at: row.get(8)?,
        finished_at: row.get(9)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Discovery Crawl Lifecycle =====

    fn create_crawl(
        &mut self,
        seed_urls: &[String],
        max_pages: u32,
        region_id: i64,
        city_id: Option<i64>,
    ) -> StorageResult<String> {
        let crawl_id = uuid::Uuid::new_v4().to_string();
        let seeds = serde_json::to_string(seed_urls)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO discovery_crawls (crawl_id, status, seed_urls, max_pages, region_id, city_id, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                crawl_id,
                CrawlStatus::Crawling.to_db_string(),
                seeds,
                max_pages,
                region_id,
                city_id,
                now_timestamp()
            ],
        )?;

        tracing::info!(
            "Created discovery crawl {} ({} seeds, budget {} pages)",
            crawl_id,
            seed_urls.len(),
            max_pages
        );
        Ok(crawl_id)
    }

    fn get_crawl(&self, crawl_id: &str) -> StorageResult<CrawlRecord> {
        let sql = format!(
            "SELECT {} FROM discovery_crawls WHERE crawl_id = ?1",
            CRAWL_COLUMNS
        );
        self.conn
            .query_row(&sql, params![crawl_id], crawl_from_row)
            .optional()?
            .ok_or_else(|| StorageError::CrawlNotFound(crawl_id.to_string()))
    }

    fn record_pages_crawled(&mut self, crawl_id: &str, pages_crawled: u32) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE discovery_crawls SET pages_crawled = MAX(pages_crawled, ?1)
             WHERE crawl_id = ?2 AND status = ?3",
            params![pages_crawled, crawl_id, CrawlStatus::Crawling.to_db_string()],
        )?;
        Ok(())
    }

    fn mark_crawled(
        &mut self,
        crawl_id: &str,
        pages_crawled: u32,
    ) -> StorageResult<TransitionOutcome> {
        let to = CrawlStatus::Crawled;
        let from = match self.gate(crawl_id, to, false)? {
            Gate::Apply(from) => from,
            Gate::Skip(current) => return Ok(TransitionOutcome::Stale { current }),
        };

        let changed = self.conn.execute(
            "UPDATE discovery_crawls
             SET status = ?1, pages_crawled = MAX(pages_crawled, ?2), crawl_finished_at = ?3
             WHERE crawl_id = ?4 AND status = ?5",
            params![
                to.to_db_string(),
                pages_crawled,
                now_timestamp(),
                crawl_id,
                from.to_db_string()
            ],
        )?;
        self.settle(crawl_id, from, to, changed)
    }

    fn mark_processing(&mut self, crawl_id: &str) -> StorageResult<TransitionOutcome> {
        let to = CrawlStatus::Processing;
        let from = match self.gate(crawl_id, to, false)? {
            Gate::Apply(from) => from,
            Gate::Skip(current) => return Ok(TransitionOutcome::Stale { current }),
        };

        let changed = self.conn.execute(
            "UPDATE discovery_crawls SET status = ?1, processing_started_at = ?2
             WHERE crawl_id = ?3 AND status = ?4",
            params![
                to.to_db_string(),
                now_timestamp(),
                crawl_id,
                from.to_db_string()
            ],
        )?;
        self.settle(crawl_id, from, to, changed)
    }

    fn mark_completed(
        &mut self,
        crawl_id: &str,
        counts: BusinessCounts,
    ) -> StorageResult<TransitionOutcome> {
        let to = CrawlStatus::Completed;
        let from = match self.gate(crawl_id, to, false)? {
            Gate::Apply(from) => from,
            Gate::Skip(current) => return Ok(TransitionOutcome::Stale { current }),
        };

        let changed = self.conn.execute(
            "UPDATE discovery_crawls
             SET status = ?1, businesses_created = ?2, businesses_skipped = ?3,
                 businesses_failed = ?4, completed_at = ?5
             WHERE crawl_id = ?6 AND status = ?7",
            params![
                to.to_db_string(),
                counts.created,
                counts.skipped,
                counts.failed,
                now_timestamp(),
                crawl_id,
                from.to_db_string()
            ],
        )?;
        self.settle(crawl_id, from, to, changed)
    }

    fn mark_failed(&mut self, crawl_id: &str, error: &str) -> StorageResult<TransitionOutcome> {
        let to = CrawlStatus::Failed;
        let from = match self.gate(crawl_id, to, false)? {
            Gate::Apply(from) => from,
            Gate::Skip(current) => return Ok(TransitionOutcome::Stale { current }),
        };

        let changed = self.conn.execute(
            "UPDATE discovery_crawls SET status = ?1, error = ?2, completed_at = ?3
             WHERE crawl_id = ?4 AND status = ?5",
            params![
                to.to_db_string(),
                error,
                now_timestamp(),
                crawl_id,
                from.to_db_string()
            ],
        )?;
        self.settle(crawl_id, from, to, changed)
    }

    fn reset_to_crawled(
        &mut self,
        crawl_id: &str,
        pages_crawled: u32,
    ) -> StorageResult<TransitionOutcome> {
        let to = CrawlStatus::Crawled;
        let from = match self.gate(crawl_id, to, true)? {
            Gate::Apply(from) => from,
            Gate::Skip(current) => return Ok(TransitionOutcome::Stale { current }),
        };

        let changed = self.conn.execute(
            "UPDATE discovery_crawls
             SET status = ?1, pages_crawled = MAX(pages_crawled, ?2), processing_started_at = NULL
             WHERE crawl_id = ?3 AND status = ?4",
            params![to.to_db_string(), pages_crawled, crawl_id, from.to_db_string()],
        )?;
        self.settle(crawl_id, from, to, changed)
    }

    fn find_incomplete_crawls(&self) -> StorageResult<Vec<CrawlRecord>> {
        let [a, b, c] = CrawlStatus::incomplete_states();
        let sql = format!(
            "SELECT {} FROM discovery_crawls WHERE status IN (?1, ?2, ?3) ORDER BY started_at, crawl_id",
            CRAWL_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let crawls = stmt
            .query_map(
                params![a.to_db_string(), b.to_db_string(), c.to_db_string()],
                crawl_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(crawls)
    }

    // ===== Scrape Job Audit =====

    fn create_scrape_job(&mut self, source: &str, query: &str) -> StorageResult<i64> {
        let now = now_timestamp();
        self.conn.execute(
            "INSERT INTO scrape_jobs (source, query, status, created_at, started_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![source, query, ScrapeJobStatus::Running.to_db_string(), now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_scrape_job(&self, job_id: i64) -> StorageResult<ScrapeJobRecord> {
        self.conn
            .query_row(
                "SELECT id, source, query, status, businesses_found, businesses_created, error,
                 created_at, started_at, finished_at FROM scrape_jobs WHERE id = ?1",
                params![job_id],
                scrape_job_from_row,
            )
            .optional()?
            .ok_or(StorageError::ScrapeJobNotFound(job_id))
    }

    fn finish_scrape_job(
        &mut self,
        job_id: i64,
        outcome: &ScrapeJobOutcome,
    ) -> StorageResult<bool> {
        let (status, error, found, created) = match outcome {
            ScrapeJobOutcome::Completed { found, created } => {
                (ScrapeJobStatus::Completed, None, *found, *created)
            }
            ScrapeJobOutcome::Failed {
                error,
                found,
                created,
            } => (ScrapeJobStatus::Failed, Some(error.as_str()), *found, *created),
        };

        let changed = self.conn.execute(
            "UPDATE scrape_jobs
             SET status = ?1, error = ?2, businesses_found = ?3, businesses_created = ?4, finished_at = ?5
             WHERE id = ?6 AND status IN (?7, ?8)",
            params![
                status.to_db_string(),
                error,
                found,
                created,
                now_timestamp(),
                job_id,
                ScrapeJobStatus::Pending.to_db_string(),
                ScrapeJobStatus::Running.to_db_string()
            ],
        )?;

        if changed == 0 {
            // Distinguish a missing job from one that already finished
            self.get_scrape_job(job_id)?;
            return Ok(false);
        }
        Ok(true)
    }

    // ===== Businesses =====

    fn insert_business_if_absent(&mut self, business: &NewBusiness) -> StorageResult<InsertOutcome> {
        let source_key = business.source_key();
        let now = now_timestamp();
        let website = business
            .website
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty());

        let changed = self.conn.execute(
            "INSERT INTO businesses (name, website, city_id, category_id, status, source_key, created_at, status_changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(source_key) DO NOTHING",
            params![
                business.name.trim(),
                website,
                business.city_id,
                business.category_id,
                BusinessStatus::Pending.to_db_string(),
                source_key,
                now
            ],
        )?;

        if changed == 1 {
            return Ok(InsertOutcome::Created(self.conn.last_insert_rowid()));
        }

        let id: i64 = self.conn.query_row(
            "SELECT id FROM businesses WHERE source_key = ?1",
            params![source_key],
            |row| row.get(0),
        )?;
        Ok(InsertOutcome::Existing(id))
    }

    fn get_business(&self, business_id: i64) -> StorageResult<BusinessRecord> {
        let sql = format!("SELECT {} FROM businesses WHERE id = ?1", BUSINESS_COLUMNS);
        self.conn
            .query_row(&sql, params![business_id], business_from_row)
            .optional()?
            .ok_or(StorageError::BusinessNotFound(business_id))
    }

    fn advance_business_status(
        &mut self,
        business_id: i64,
        target: BusinessStatus,
    ) -> StorageResult<StatusAdvance> {
        let current = self.business_status(business_id)?;
        let next = match current.step_toward(target) {
            Some(next) => next,
            None => return Ok(StatusAdvance::Unchanged(current)),
        };

        let changed = self.conn.execute(
            "UPDATE businesses SET status = ?1, status_changed_at = ?2 WHERE id = ?3 AND status = ?4",
            params![
                next.to_db_string(),
                now_timestamp(),
                business_id,
                current.to_db_string()
            ],
        )?;

        if changed == 0 {
            return Ok(StatusAdvance::Unchanged(self.business_status(business_id)?));
        }

        tracing::info!("Business {}: {} -> {}", business_id, current, next);
        Ok(StatusAdvance::Advanced {
            from: current,
            to: next,
        })
    }

    fn fail_business(&mut self, business_id: i64, error: &str) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE businesses SET status = ?1, error = ?2, status_changed_at = ?3
             WHERE id = ?4 AND status NOT IN (?1, ?5)",
            params![
                BusinessStatus::Failed.to_db_string(),
                error,
                now_timestamp(),
                business_id,
                BusinessStatus::Verified.to_db_string()
            ],
        )?;

        if changed == 0 {
            self.business_status(business_id)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn find_enrich_candidates(
        &self,
        pending_cutoff: DateTime<Utc>,
    ) -> StorageResult<Vec<BusinessRecord>> {
        let sql = format!(
            "SELECT {} FROM businesses
             WHERE status = ?1
                OR (status IN (?2, ?3) AND (website IS NULL OR website = '') AND status_changed_at <= ?4)
             ORDER BY id",
            BUSINESS_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let businesses = stmt
            .query_map(
                params![
                    BusinessStatus::Researched.to_db_string(),
                    BusinessStatus::Pending.to_db_string(),
                    BusinessStatus::Researching.to_db_string(),
                    format_timestamp(pending_cutoff)
                ],
                business_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(businesses)
    }

    // ===== Statistics =====

    fn count_crawls_by_status(&self, status: CrawlStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM discovery_crawls WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total_pages_crawled(&self) -> StorageResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(pages_crawled), 0) FROM discovery_crawls",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    fn count_businesses_by_status(&self, status: BusinessStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM businesses WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().unwrap()
    }

    fn new_crawl(storage: &mut SqliteStorage) -> String {
        storage
            .create_crawl(&["https://example.com/".to_string()], 50, 1, Some(3))
            .unwrap()
    }

    fn business(name: &str, website: Option<&str>) -> NewBusiness {
        NewBusiness {
            name: name.to_string(),
            website: website.map(str::to_string),
            city_id: Some(3),
            category_id: None,
        }
    }

    #[test]
    fn test_create_crawl() {
        let mut storage = storage();
        let crawl_id = new_crawl(&mut storage);

        let crawl = storage.get_crawl(&crawl_id).unwrap();
        assert_eq!(crawl.status, CrawlStatus::Crawling);
        assert_eq!(crawl.seed_urls, vec!["https://example.com/".to_string()]);
        assert_eq!(crawl.max_pages, 50);
        assert_eq!(crawl.pages_crawled, 0);
        assert_eq!(crawl.city_id, Some(3));
        assert!(crawl.completed_at.is_none());
    }

    #[test]
    fn test_missing_crawl() {
        let storage = storage();
        assert!(matches!(
            storage.get_crawl("nope"),
            Err(StorageError::CrawlNotFound(_))
        ));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut storage = storage();
        let crawl_id = new_crawl(&mut storage);

        assert!(storage.mark_crawled(&crawl_id, 12).unwrap().is_applied());
        assert!(storage.mark_processing(&crawl_id).unwrap().is_applied());
        let counts = BusinessCounts {
            created: 4,
            skipped: 2,
            failed: 1,
        };
        assert!(storage.mark_completed(&crawl_id, counts).unwrap().is_applied());

        let crawl = storage.get_crawl(&crawl_id).unwrap();
        assert_eq!(crawl.status, CrawlStatus::Completed);
        assert_eq!(crawl.pages_crawled, 12);
        assert_eq!(crawl.businesses_created, 4);
        assert_eq!(crawl.businesses_skipped, 2);
        assert_eq!(crawl.businesses_failed, 1);
        assert!(crawl.crawl_finished_at.is_some());
        assert!(crawl.processing_started_at.is_some());
        assert!(crawl.completed_at.is_some());
    }

    #[test]
    fn test_crawled_to_completed_rejected() {
        let mut storage = storage();
        let crawl_id = new_crawl(&mut storage);
        storage.mark_crawled(&crawl_id, 3).unwrap();

        let result = storage.mark_completed(&crawl_id, BusinessCounts::default());
        assert!(matches!(
            result,
            Err(StorageError::InvalidTransition {
                from: CrawlStatus::Crawled,
                to: CrawlStatus::Completed,
                ..
            })
        ));
        assert_eq!(storage.get_crawl(&crawl_id).unwrap().status, CrawlStatus::Crawled);
    }

    #[test]
    fn test_duplicate_transition_is_stale() {
        let mut storage = storage();
        let crawl_id = new_crawl(&mut storage);

        assert!(storage.mark_crawled(&crawl_id, 3).unwrap().is_applied());
        assert_eq!(
            storage.mark_crawled(&crawl_id, 5).unwrap(),
            TransitionOutcome::Stale {
                current: CrawlStatus::Crawled
            }
        );
        assert_eq!(storage.get_crawl(&crawl_id).unwrap().pages_crawled, 3);
    }

    #[test]
    fn test_mark_failed_from_crawling_sets_completed_at() {
        let mut storage = storage();
        let crawl_id = new_crawl(&mut storage);

        assert!(storage
            .mark_failed(&crawl_id, "interrupted with no pages")
            .unwrap()
            .is_applied());

        let crawl = storage.get_crawl(&crawl_id).unwrap();
        assert_eq!(crawl.status, CrawlStatus::Failed);
        assert_eq!(crawl.error.as_deref(), Some("interrupted with no pages"));
        assert!(crawl.completed_at.is_some());

        // Terminal records ignore late failures
        assert!(!storage.mark_failed(&crawl_id, "again").unwrap().is_applied());
    }

    #[test]
    fn test_pages_crawled_is_monotonic() {
        let mut storage = storage();
        let crawl_id = new_crawl(&mut storage);

        storage.record_pages_crawled(&crawl_id, 5).unwrap();
        storage.record_pages_crawled(&crawl_id, 3).unwrap();
        assert_eq!(storage.get_crawl(&crawl_id).unwrap().pages_crawled, 5);

        storage.mark_crawled(&crawl_id, 4).unwrap();
        assert_eq!(storage.get_crawl(&crawl_id).unwrap().pages_crawled, 5);
    }

    #[test]
    fn test_reset_to_crawled_only_from_processing() {
        let mut storage = storage();
        let crawl_id = new_crawl(&mut storage);

        assert!(matches!(
            storage.reset_to_crawled(&crawl_id, 1),
            Err(StorageError::InvalidTransition { .. })
        ));

        storage.mark_crawled(&crawl_id, 2).unwrap();
        storage.mark_processing(&crawl_id).unwrap();
        assert!(storage.reset_to_crawled(&crawl_id, 4).unwrap().is_applied());

        let crawl = storage.get_crawl(&crawl_id).unwrap();
        assert_eq!(crawl.status, CrawlStatus::Crawled);
        assert_eq!(crawl.pages_crawled, 4);
        assert!(crawl.processing_started_at.is_none());
    }

    #[test]
    fn test_find_incomplete_crawls() {
        let mut storage = storage();
        let crawling = new_crawl(&mut storage);
        let crawled = new_crawl(&mut storage);
        let done = new_crawl(&mut storage);

        storage.mark_crawled(&crawled, 1).unwrap();
        storage.mark_failed(&done, "boom").unwrap();

        let ids: Vec<String> = storage
            .find_incomplete_crawls()
            .unwrap()
            .into_iter()
            .map(|c| c.crawl_id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&crawling));
        assert!(ids.contains(&crawled));
    }

    #[test]
    fn test_scrape_job_finished_once() {
        let mut storage = storage();
        let job_id = storage.create_scrape_job("places", "bakery in Graz").unwrap();
        assert_eq!(
            storage.get_scrape_job(job_id).unwrap().status,
            ScrapeJobStatus::Running
        );

        let done = ScrapeJobOutcome::Completed {
            found: 5,
            created: 3,
        };
        assert!(storage.finish_scrape_job(job_id, &done).unwrap());
        let failed = ScrapeJobOutcome::Failed {
            error: "late".to_string(),
            found: 0,
            created: 0,
        };
        assert!(!storage.finish_scrape_job(job_id, &failed).unwrap());

        let job = storage.get_scrape_job(job_id).unwrap();
        assert_eq!(job.status, ScrapeJobStatus::Completed);
        assert_eq!(job.businesses_found, 5);
        assert_eq!(job.businesses_created, 3);
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn test_insert_business_is_idempotent() {
        let mut storage = storage();
        let first = storage
            .insert_business_if_absent(&business("Roma", Some("https://roma.example/")))
            .unwrap();
        let second = storage
            .insert_business_if_absent(&business("Trattoria Roma", Some("http://www.roma.example")))
            .unwrap();

        assert!(matches!(first, InsertOutcome::Created(_)));
        assert_eq!(second, InsertOutcome::Existing(first.id()));
        assert_eq!(
            storage
                .count_businesses_by_status(BusinessStatus::Pending)
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_advance_moves_one_step() {
        let mut storage = storage();
        let id = storage
            .insert_business_if_absent(&business("Roma", None))
            .unwrap()
            .id();

        let advance = storage
            .advance_business_status(id, BusinessStatus::Enriched)
            .unwrap();
        assert_eq!(
            advance,
            StatusAdvance::Advanced {
                from: BusinessStatus::Pending,
                to: BusinessStatus::Researching
            }
        );

        let unchanged = storage
            .advance_business_status(id, BusinessStatus::Researching)
            .unwrap();
        assert_eq!(unchanged, StatusAdvance::Unchanged(BusinessStatus::Researching));
    }

    #[test]
    fn test_failed_business_never_moves() {
        let mut storage = storage();
        let id = storage
            .insert_business_if_absent(&business("Roma", None))
            .unwrap()
            .id();

        assert!(storage.fail_business(id, "exhausted").unwrap());
        assert!(!storage.fail_business(id, "again").unwrap());
        assert_eq!(
            storage
                .advance_business_status(id, BusinessStatus::Researched)
                .unwrap(),
            StatusAdvance::Unchanged(BusinessStatus::Failed)
        );
        assert_eq!(storage.get_business(id).unwrap().error.as_deref(), Some("exhausted"));
    }

    #[test]
    fn test_enrich_candidates() {
        let mut storage = storage();
        let researched = storage
            .insert_business_if_absent(&business("A", Some("https://a.example")))
            .unwrap()
            .id();
        storage
            .advance_business_status(researched, BusinessStatus::Researched)
            .unwrap();
        storage
            .advance_business_status(researched, BusinessStatus::Researched)
            .unwrap();
        let no_website = storage
            .insert_business_if_absent(&business("B", None))
            .unwrap()
            .id();
        storage
            .insert_business_if_absent(&business("C", Some("https://c.example")))
            .unwrap();

        let future_cutoff = Utc::now() + Duration::hours(1);
        let ids: Vec<i64> = storage
            .find_enrich_candidates(future_cutoff)
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![researched, no_website]);

        let past_cutoff = Utc::now() - Duration::hours(24);
        let ids: Vec<i64> = storage
            .find_enrich_candidates(past_cutoff)
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![researched]);
    }

    #[test]
    fn test_statistics() {
        let mut storage = storage();
        let a = new_crawl(&mut storage);
        new_crawl(&mut storage);
        storage.mark_crawled(&a, 7).unwrap();

        assert_eq!(storage.count_crawls_by_status(CrawlStatus::Crawling).unwrap(), 1);
        assert_eq!(storage.count_crawls_by_status(CrawlStatus::Crawled).unwrap(), 1);
        assert_eq!(storage.count_total_pages_crawled().unwrap(), 7);
    }
}
