use crate::config::priority::PriorityEntry;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Directory Harvester
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    /// Optional path to a standalone priority table file
    #[serde(rename = "priority-table", default)]
    pub priority_table: Option<PathBuf>,
    /// Inline priority entries; take precedence over the built-in table
    #[serde(default)]
    pub priority: Vec<PriorityEntry>,
}

/// HTTP fetcher behavior
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirect hops followed per request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Pause between sequential fetches within one crawl (milliseconds)
    #[serde(rename = "politeness-delay-ms", default = "default_politeness_delay_ms")]
    pub politeness_delay_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            politeness_delay_ms: default_politeness_delay_ms(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the identifying user agent string
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Crawl budget and extraction settings
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Page budget for a discovery crawl
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Page budget for crawling a single business website
    #[serde(rename = "site-max-pages", default = "default_site_max_pages")]
    pub site_max_pages: u32,

    /// Length of the content excerpt kept per page in summaries
    #[serde(rename = "excerpt-chars", default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// schema.org types kept from embedded structured data
    #[serde(rename = "structured-data-types", default = "default_structured_data_types")]
    pub structured_data_types: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            site_max_pages: default_site_max_pages(),
            excerpt_chars: default_excerpt_chars(),
            structured_data_types: default_structured_data_types(),
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory for crawl artifacts
    #[serde(rename = "artifacts-dir")]
    pub artifacts_dir: String,
}

/// Pipeline timing and retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Delay before the resume supervisor runs at startup (seconds)
    #[serde(rename = "resume-grace-secs", default = "default_resume_grace_secs")]
    pub resume_grace_secs: u64,

    /// Age after which a pending business with no website is pulled into enrichment
    #[serde(rename = "no-website-grace-hours", default = "default_no_website_grace_hours")]
    pub no_website_grace_hours: i64,

    /// Maximum attempts per queued task
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resume_grace_secs: default_resume_grace_secs(),
            no_website_grace_hours: default_no_website_grace_hours(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Concurrency limits per named queue
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(rename = "scraper-concurrency", default = "default_scraper_concurrency")]
    pub scraper_concurrency: usize,

    #[serde(rename = "research-concurrency", default = "default_research_concurrency")]
    pub research_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            scraper_concurrency: default_scraper_concurrency(),
            research_concurrency: default_research_concurrency(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_max_redirects() -> usize {
    5
}

fn default_politeness_delay_ms() -> u64 {
    1000
}

fn default_max_pages() -> u32 {
    200
}

fn default_site_max_pages() -> u32 {
    10
}

fn default_excerpt_chars() -> usize {
    3000
}

fn default_resume_grace_secs() -> u64 {
    5
}

fn default_no_website_grace_hours() -> i64 {
    24
}

fn default_max_attempts() -> u32 {
    3
}

fn default_scraper_concurrency() -> usize {
    2
}

fn default_research_concurrency() -> usize {
    4
}

/// Business-like schema.org types retained from structured data
pub fn default_structured_data_types() -> Vec<String> {
    [
        "LocalBusiness",
        "Organization",
        "Restaurant",
        "CafeOrCoffeeShop",
        "BarOrPub",
        "Bakery",
        "FoodEstablishment",
        "Hotel",
        "LodgingBusiness",
        "Store",
        "HealthAndBeautyBusiness",
        "ProfessionalService",
        "MedicalBusiness",
        "AutomotiveBusiness",
        "HomeAndConstructionBusiness",
        "SportsActivityLocation",
        "EntertainmentBusiness",
        "TouristAttraction",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
