//! Configuration module for Directory Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! plus the data-driven priority table used to rank crawl candidates.
//!
//! # Example
//!
//! ```no_run
//! use directory_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvester.toml")).unwrap();
//! println!("Requests time out after {}s", config.fetcher.timeout_secs);
//! ```

mod parser;
pub mod priority;
mod types;
mod validation;

// Re-export types
pub use priority::{PriorityEntry, PrioritySource, PriorityTable, PriorityTableCache};
pub use types::{
    default_structured_data_types, Config, CrawlerConfig, FetcherConfig, PipelineConfig,
    QueueConfig, StorageConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
