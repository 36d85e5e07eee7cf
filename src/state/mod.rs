//! State module for tracking pipeline progress
//!
//! # Components
//!
//! - `CrawlStatus`: lifecycle of a discovery crawl (crawling, crawled, processing, completed, failed)
//! - `BusinessStatus`: coarse pipeline status of a business

mod business_status;
mod crawl_status;

// Re-export main types
pub use business_status::BusinessStatus;
pub use crawl_status::{CrawlStatus, TransitionCheck};
