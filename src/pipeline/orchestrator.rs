//! Stage chaining for a single business
//!
//! Every per-business job ends here. `complete_stage` moves the business at
//! most one status step forward and enqueues whatever `next_action` decides.
//! A stage that returns an error never reaches it, so status stays put for
//! the retry.

use crate::pipeline::jobs::Job;
use crate::pipeline::stage::{next_action, NextAction, Stage, StageOutcome};
use crate::pipeline::website::crawl_business_website;
use crate::pipeline::PipelineContext;
use crate::state::BusinessStatus;
use crate::storage::{format_timestamp, Storage, StatusAdvance};
use crate::HarvestError;
use chrono::{Duration, Utc};

/// Runs one stage for a business and chains the next one
pub async fn run_business_stage(
    ctx: &PipelineContext,
    stage: Stage,
    business_id: i64,
) -> Result<NextAction, HarvestError> {
    let business = ctx.with_storage(|s| s.get_business(business_id))?;

    if business.status.is_failed() {
        tracing::info!("Business {} has failed, dropping {} stage", business_id, stage);
        return Ok(NextAction::Stop);
    }

    let external = |e: anyhow::Error| HarvestError::External {
        stage,
        message: format!("{:#}", e),
    };

    let outcome = match stage {
        Stage::Discovery => {
            tracing::warn!("Discovery is not a per-business stage (business {})", business_id);
            return Ok(NextAction::Stop);
        }
        Stage::WebsiteCrawl => crawl_business_website(ctx, &business).await?,
        Stage::WebSearch => ctx.research().web_search(&business).await.map_err(external)?,
        Stage::Enrich => ctx.research().enrich(&business).await.map_err(external)?,
        Stage::Translate => ctx.research().translate(&business).await.map_err(external)?,
    };

    complete_stage(ctx, business_id, stage, outcome).await
}

/// Records a finished stage and enqueues the next one
///
/// # Arguments
///
/// * `business_id` - The business the stage ran for
/// * `stage` - The stage that finished
/// * `outcome` - How it finished
///
/// # Returns
///
/// The action taken after the stage
pub async fn complete_stage(
    ctx: &PipelineContext,
    business_id: i64,
    stage: Stage,
    outcome: StageOutcome,
) -> Result<NextAction, HarvestError> {
    if outcome.advances_status() {
        if let Some(target) = stage.target_status() {
            match ctx.with_storage(|s| s.advance_business_status(business_id, target))? {
                StatusAdvance::Advanced { from, to } => {
                    tracing::info!(
                        "Business {}: {} -> {} after {} ({})",
                        business_id,
                        from,
                        to,
                        stage,
                        outcome
                    );
                }
                StatusAdvance::Unchanged(status) => {
                    tracing::debug!(
                        "Business {} stays {} after {} ({})",
                        business_id,
                        status,
                        stage,
                        outcome
                    );
                }
            }
        }
    }

    let action = next_action(stage, outcome);
    match action {
        NextAction::Enqueue(next) => {
            if let Some(job) = Job::for_stage(next, business_id) {
                let result = ctx.queue().enqueue(job).await?;
                tracing::debug!(
                    "Business {}: {} ({}) -> {} [{}]",
                    business_id,
                    stage,
                    outcome,
                    next,
                    if result.is_queued() { "queued" } else { "already queued" }
                );
            }
        }
        NextAction::Done => {
            tracing::info!("Business {} finished the pipeline", business_id);
        }
        NextAction::Stop => {
            tracing::debug!("Business {}: {} ({}), not chaining", business_id, stage, outcome);
        }
    }

    Ok(action)
}

/// Enqueues enrichment for every business that is due for it
///
/// Picks up businesses that reached `researched`, and businesses without a
/// website that have sat short of it for longer than the grace window.
///
/// A `researched` business gets `enrich`. A stalled website-less business
/// gets the first stage it is missing instead (`website_crawl` from
/// `pending`, `web_search` from `researching`). That stage short-circuits on
/// the missing website and chains through to `enrich`, so status climbs one
/// step per stage and enrich and translate each run once. Queueing `enrich`
/// directly would run both stages again on every sweep until the business
/// caught up.
///
/// # Returns
///
/// The number of newly queued jobs
pub async fn enqueue_enrich_candidates(ctx: &PipelineContext) -> Result<usize, HarvestError> {
    let cutoff = Utc::now() - Duration::hours(ctx.config().pipeline.no_website_grace_hours);
    let candidates = ctx.with_storage(|s| s.find_enrich_candidates(cutoff))?;

    let mut queued = 0;
    for business in &candidates {
        let stage = sweep_stage(business.status);
        let Some(job) = Job::for_stage(stage, business.id) else {
            continue;
        };
        if ctx.queue().enqueue(job).await?.is_queued() {
            queued += 1;
        }
    }

    if !candidates.is_empty() {
        tracing::info!(
            "Enrichment sweep: {} candidates, {} queued (cutoff {})",
            candidates.len(),
            queued,
            format_timestamp(cutoff)
        );
    }
    Ok(queued)
}

/// The stage that moves a sweep candidate toward `enrich`
fn sweep_stage(status: BusinessStatus) -> Stage {
    match status {
        BusinessStatus::Pending => Stage::WebsiteCrawl,
        BusinessStatus::Researching => Stage::WebSearch,
        _ => Stage::Enrich,
    }
}
