use crate::config::priority::PriorityEntry;
use crate::config::types::{
    Config, CrawlerConfig, FetcherConfig, PipelineConfig, QueueConfig, StorageConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(&config.storage)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_queue_config(&config.queues)?;
    validate_priority_entries(&config.priority)?;
    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.timeout_secs > 120 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 120, got {}",
            config.timeout_secs
        )));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.site_max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "site_max_pages must be >= 1, got {}",
            config.site_max_pages
        )));
    }

    if config.excerpt_chars == 0 {
        return Err(ConfigError::Validation(
            "excerpt_chars must be > 0".to_string(),
        ));
    }

    if config.structured_data_types.iter().any(|t| t.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "structured_data_types cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.artifacts_dir.is_empty() {
        return Err(ConfigError::Validation(
            "artifacts_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.no_website_grace_hours < 0 {
        return Err(ConfigError::Validation(format!(
            "no_website_grace_hours cannot be negative, got {}",
            config.no_website_grace_hours
        )));
    }

    Ok(())
}

fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("scraper_concurrency", config.scraper_concurrency),
        ("research_concurrency", config.research_concurrency),
    ] {
        if !(1..=64).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 64, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

fn validate_priority_entries(entries: &[PriorityEntry]) -> Result<(), ConfigError> {
    for entry in entries {
        if entry.keyword.trim().is_empty() {
            return Err(ConfigError::Validation(
                "priority keyword cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Must contain a single @ with text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
