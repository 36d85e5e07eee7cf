//! Website crawl stage for a single business

use crate::artifacts::PageArtifactSink;
use crate::crawler::{CrawlFailure, SiteCrawlResult};
use crate::pipeline::stage::StageOutcome;
use crate::pipeline::PipelineContext;
use crate::storage::BusinessRecord;
use crate::url::parse_website;
use crate::HarvestError;

/// Crawls a business website and writes its page and summary artifacts
///
/// Pages land in `businesses/<id>/` as they are fetched, replacing those of
/// any earlier attempt.
///
/// # Returns
///
/// * `NoWebsite` - Nothing to crawl; the chain moves on
/// * `Empty` - The seed answered permanently with nothing (404, non-HTML);
///   an empty summary is written so the attempt is on record
/// * `Completed` - The summary holds at least the seed page
/// * `Err` - The site was unreachable; the queue retries
pub async fn crawl_business_website(
    ctx: &PipelineContext,
    business: &BusinessRecord,
) -> Result<StageOutcome, HarvestError> {
    let Some(target) = business.website.as_deref().and_then(parse_website) else {
        tracing::info!("Business {} has no usable website, skipping crawl", business.id);
        return Ok(StageOutcome::NoWebsite);
    };

    let crawler = ctx.site_crawler(ctx.config().crawler.site_max_pages)?;
    let excerpt_chars = ctx.config().crawler.excerpt_chars;

    ctx.artifacts().clear_business_pages(business.id)?;
    let mut sink = PageArtifactSink::for_business(ctx.artifacts(), business.id);

    let (result, outcome) = match crawler.crawl(&target, &mut sink).await {
        Ok(result) => (result, StageOutcome::Completed),
        Err(CrawlFailure::NoSeedContent { url, reason }) => {
            tracing::warn!(
                "Business {}: no content at {} ({}), continuing with an empty result",
                business.id,
                url,
                reason
            );
            (SiteCrawlResult::empty(), StageOutcome::Empty)
        }
        Err(failure) => return Err(failure.into()),
    };

    let path = ctx
        .artifacts()
        .write_business_summary(business.id, &result.summary(excerpt_chars))?;
    tracing::info!(
        "Business {}: {} pages from {} written to {}",
        business.id,
        result.pages_crawled(),
        target,
        path.display()
    );

    Ok(outcome)
}
