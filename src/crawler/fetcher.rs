//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the identifying user agent string
//! - Bounded GET requests (timeout, redirect limit)
//! - Error classification into transport, HTTP status and non-HTML failures
//!
//! There are no retries here. A failed page is either skipped by the site
//! crawler or surfaced to the job queue, which owns the retry policy.

use crate::config::{FetcherConfig, UserAgentConfig};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Statuses that mean the source will not serve this page, whatever we do
const PERMANENT_STATUSES: &[u16] = &[403, 404, 410, 451];

/// Classified fetch failure
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// DNS, connection, TLS, timeout or body read failure
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// The server answered with something other than 200
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    /// The response is not parseable markup
    #[error("not HTML at {url} (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },
}

impl FetchError {
    /// Short machine-readable name of the failure class
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport_error",
            Self::Http { .. } => "http_error",
            Self::NotHtml { .. } => "not_html",
        }
    }

    /// Returns true if a later attempt may succeed
    ///
    /// | Condition | Retryable |
    /// |-----------|-----------|
    /// | Transport failure / timeout | yes |
    /// | HTTP 429, 5xx | yes |
    /// | HTTP 403, 404, 410, 451, other 4xx | no |
    /// | Non-HTML content | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::NotHtml { .. } => false,
        }
    }

    /// Returns true for failures the pipeline treats as an empty result
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Http { status, .. } => {
                PERMANENT_STATUSES.contains(status) || !self.is_retryable()
            }
            Self::NotHtml { .. } => true,
            Self::Transport { .. } => false,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. } | Self::Http { url, .. } | Self::NotHtml { url, .. } => url,
        }
    }
}

/// A successfully fetched HTML page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value (may be empty)
    pub content_type: String,
    /// Page body
    pub html: String,
}

/// Builds an HTTP client with the configured limits and user agent
///
/// # Example
///
/// ```no_run
/// use directory_harvester::config::{FetcherConfig, UserAgentConfig};
/// use directory_harvester::crawler::build_http_client;
///
/// let ua = UserAgentConfig {
///     crawler_name: "DirectoryHarvester".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/bot".to_string(),
///     contact_email: "bot@example.com".to_string(),
/// };
///
/// let client = build_http_client(&FetcherConfig::default(), &ua).unwrap();
/// ```
pub fn build_http_client(
    fetcher: &FetcherConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetcher.timeout_secs))
        .connect_timeout(Duration::from_secs(fetcher.timeout_secs.min(10)))
        .redirect(Policy::limited(fetcher.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Polite single-request fetcher
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(fetcher: &FetcherConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(fetcher, user_agent)?,
        })
    }

    /// Issues one GET request and classifies the outcome
    ///
    /// # Request Flow
    ///
    /// 1. GET with the client's timeout and redirect limit
    /// 2. Anything other than 200 → `FetchError::Http`
    /// 3. Content-Type not HTML (or body not markup when the header is missing) → `FetchError::NotHtml`
    /// 4. Body read failure → `FetchError::Transport`
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_transport_error(url, &e))?;

        let status = response.status();
        let final_url = response.url().clone();

        if status != StatusCode::OK {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.is_empty() && !content_type.to_lowercase().contains("html") {
            return Err(FetchError::NotHtml {
                url: url.to_string(),
                content_type,
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| classify_transport_error(url, &e))?;

        if content_type.is_empty() && !looks_like_markup(&html) {
            return Err(FetchError::NotHtml {
                url: url.to_string(),
                content_type: "unknown".to_string(),
            });
        }

        Ok(FetchedPage {
            final_url,
            status_code: status.as_u16(),
            content_type,
            html,
        })
    }
}

/// Maps a reqwest error to a transport failure with a readable message
fn classify_transport_error(url: &Url, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_redirect() {
        "redirect limit exceeded".to_string()
    } else {
        error.to_string()
    };

    FetchError::Transport {
        url: url.to_string(),
        message,
    }
}

/// Sniffs a body without a Content-Type header for HTML markup
fn looks_like_markup(body: &str) -> bool {
    let head: String = body.chars().take(1024).collect::<String>().to_lowercase();
    head.contains("<html") || head.contains("<!doctype html") || head.contains("<body")
}
