//! Statistics generation from the pipeline database
//!
//! This module provides functionality for extracting and displaying
//! discovery crawl and business statistics from the storage layer.

use crate::state::{BusinessStatus, CrawlStatus};
use crate::storage::Storage;
use crate::HarvestError;
use std::collections::HashMap;

/// Pipeline statistics summary
#[derive(Debug, Clone, Default)]
pub struct PipelineStatistics {
    /// Count of discovery crawls by status
    pub crawls_by_status: HashMap<CrawlStatus, u64>,

    /// Total number of discovery crawls
    pub total_crawls: u64,

    /// Pages fetched across all discovery crawls
    pub total_pages_crawled: u64,

    /// Count of businesses by status
    pub businesses_by_status: HashMap<BusinessStatus, u64>,

    /// Total number of businesses
    pub total_businesses: u64,
}

impl PipelineStatistics {
    /// Crawls that the resume supervisor would pick up
    pub fn incomplete_crawls(&self) -> u64 {
        CrawlStatus::incomplete_states()
            .iter()
            .filter_map(|s| self.crawls_by_status.get(s))
            .sum()
    }

    pub fn crawls(&self, status: CrawlStatus) -> u64 {
        self.crawls_by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn businesses(&self, status: BusinessStatus) -> u64 {
        self.businesses_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(PipelineStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<PipelineStatistics, HarvestError> {
    let mut stats = PipelineStatistics {
        total_pages_crawled: storage.count_total_pages_crawled()?,
        ..Default::default()
    };

    for status in CrawlStatus::all_states() {
        let count = storage.count_crawls_by_status(status)?;
        stats.total_crawls += count;
        if count > 0 {
            stats.crawls_by_status.insert(status, count);
        }
    }

    for status in BusinessStatus::all_states() {
        let count = storage.count_businesses_by_status(status)?;
        stats.total_businesses += count;
        if count > 0 {
            stats.businesses_by_status.insert(status, count);
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &PipelineStatistics) {
    println!("=== Pipeline Statistics ===\n");

    println!("Discovery Crawls:");
    println!("  Total crawls: {}", stats.total_crawls);
    println!("  Pages crawled: {}", stats.total_pages_crawled);
    println!("  Awaiting resume: {}", stats.incomplete_crawls());
    for status in CrawlStatus::all_states() {
        let count = stats.crawls(status);
        if count > 0 {
            println!("  {}: {}", status, count);
        }
    }
    println!();

    println!("Businesses:");
    println!("  Total businesses: {}", stats.total_businesses);
    for status in BusinessStatus::all_states() {
        let count = stats.businesses(status);
        let percentage = if stats.total_businesses > 0 {
            (count as f64 / stats.total_businesses as f64) * 100.0
        } else {
            0.0
        };
        if count > 0 {
            println!("  {}: {} ({:.1}%)", status, count, percentage);
        }
    }
    println!();

    let finished = stats.crawls(CrawlStatus::Completed) + stats.crawls(CrawlStatus::Failed);
    let success_rate = if finished > 0 {
        (stats.crawls(CrawlStatus::Completed) as f64 / finished as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Crawl Success Rate: {:.1}% ({} / {} finished crawls completed)",
        success_rate,
        stats.crawls(CrawlStatus::Completed),
        finished
    );
}
