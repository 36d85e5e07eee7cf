//! Directory Harvester: discovery and crawl engine for a local business directory
//!
//! This crate carries candidate businesses from external sources through the
//! enrichment pipeline. It contains the per-site crawler, the durable crawl
//! lifecycle store, the crash-recovery supervisor and the stage orchestrator.

pub mod artifacts;
pub mod config;
pub mod crawler;
pub mod output;
pub mod pipeline;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Directory Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("No usable content at seed {url}: {reason}")]
    NoSeedContent { url: String, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] artifacts::ArtifactError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("{stage} stage failed: {message}")]
    External {
        stage: pipeline::Stage,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl HarvestError {
    /// Returns true if the job queue should retry the task that produced this error
    ///
    /// Lifecycle defects and configuration problems are never retried; a retry
    /// cannot change their outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::NoSeedContent { .. } => false,
            Self::StorageError(e) => e.is_retryable(),
            Self::Database(_) | Self::Io(_) | Self::Reqwest(_) => true,
            Self::External { .. } | Self::Artifact(_) | Self::Storage(_) => true,
            Self::Config(_) => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Directory Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{BusinessStatus, CrawlStatus};
pub use crate::url::{dedup_key, extract_domain};
