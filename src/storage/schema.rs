//! Database schema definitions
//!
//! This module contains the SQL schema for the harvester database: the
//! discovery crawl lifecycle, the API scrape audit trail and the businesses
//! the pipeline advances.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One record per discovery crawl run
CREATE TABLE IF NOT EXISTS discovery_crawls (
    crawl_id TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    seed_urls TEXT NOT NULL,
    max_pages INTEGER NOT NULL,
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    businesses_created INTEGER NOT NULL DEFAULT 0,
    businesses_skipped INTEGER NOT NULL DEFAULT 0,
    businesses_failed INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    region_id INTEGER NOT NULL,
    city_id INTEGER,
    started_at TEXT NOT NULL,
    crawl_finished_at TEXT,
    processing_started_at TEXT,
    completed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_discovery_crawls_status ON discovery_crawls(status);

-- Audit trail of API discovery attempts
CREATE TABLE IF NOT EXISTS scrape_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    query TEXT NOT NULL,
    status TEXT NOT NULL,
    businesses_found INTEGER NOT NULL DEFAULT 0,
    businesses_created INTEGER NOT NULL DEFAULT 0,
    error TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT
);

-- Businesses carried through the enrichment pipeline
CREATE TABLE IF NOT EXISTS businesses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    website TEXT,
    city_id INTEGER,
    category_id INTEGER,
    status TEXT NOT NULL,
    source_key TEXT NOT NULL UNIQUE,
    error TEXT,
    created_at TEXT NOT NULL,
    status_changed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_businesses_status ON businesses(status);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
