//! External collaborators the pipeline calls out to
//!
//! Places APIs, web search, LLM enrichment and translation live outside this
//! crate. Each is reached through a trait so deployments plug in real clients
//! and tests plug in fakes.

use crate::pipeline::stage::StageOutcome;
use crate::storage::{BusinessRecord, NewBusiness};
use async_trait::async_trait;

/// Source of business candidates for API discovery jobs
#[async_trait]
pub trait PlaceSource: Send + Sync {
    /// Name recorded on the scrape job audit row
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        city_id: Option<i64>,
        category_id: Option<i64>,
    ) -> anyhow::Result<Vec<NewBusiness>>;
}

/// Place source used when none is configured; finds nothing
pub struct NoPlaces;

#[async_trait]
impl PlaceSource for NoPlaces {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(
        &self,
        query: &str,
        _city_id: Option<i64>,
        _category_id: Option<i64>,
    ) -> anyhow::Result<Vec<NewBusiness>> {
        tracing::debug!("No place source configured, skipping query {:?}", query);
        Ok(Vec::new())
    }
}

/// Research stages that follow the website crawl
///
/// An `Err` is treated as retryable; the business status stays put.
#[async_trait]
pub trait ResearchServices: Send + Sync {
    async fn web_search(&self, business: &BusinessRecord) -> anyhow::Result<StageOutcome>;

    async fn enrich(&self, business: &BusinessRecord) -> anyhow::Result<StageOutcome>;

    async fn translate(&self, business: &BusinessRecord) -> anyhow::Result<StageOutcome>;
}

/// Research services that do nothing and report success
pub struct NoopResearch;

#[async_trait]
impl ResearchServices for NoopResearch {
    async fn web_search(&self, business: &BusinessRecord) -> anyhow::Result<StageOutcome> {
        tracing::debug!("web search disabled for business {}", business.id);
        Ok(StageOutcome::Completed)
    }

    async fn enrich(&self, business: &BusinessRecord) -> anyhow::Result<StageOutcome> {
        tracing::debug!("enrichment disabled for business {}", business.id);
        Ok(StageOutcome::Completed)
    }

    async fn translate(&self, business: &BusinessRecord) -> anyhow::Result<StageOutcome> {
        tracing::debug!("translation disabled for business {}", business.id);
        Ok(StageOutcome::Completed)
    }
}
