//! Crawl resume supervisor
//!
//! Runs at the start of every process that drains the queues. The in-memory
//! job state of the previous process is gone, so every non-terminal discovery
//! crawl is reconciled from its stored status plus the page artifacts on disk:
//!
//! | Status | Pages on disk | Action |
//! |--------|---------------|--------|
//! | crawling | > 0 | mark `crawled` with the observed count, queue processing |
//! | crawling | 0 | mark `failed`: "interrupted with no pages" |
//! | crawled | any | queue processing |
//! | processing | any | back to `crawled` with the observed count, queue processing |
//!
//! Transitions are conditional and queueing is deduplicated, so running the
//! supervisor twice leaves the same state and at most one processing job. A
//! crawl that cannot be reconciled is logged and left for the next pass; the
//! others are still handled.

use crate::pipeline::jobs::Job;
use crate::pipeline::orchestrator::enqueue_enrich_candidates;
use crate::pipeline::PipelineContext;
use crate::state::CrawlStatus;
use crate::storage::{CrawlRecord, Storage, TransitionOutcome};
use crate::HarvestError;
use std::time::Duration;

/// Error recorded on a crawl that was interrupted before writing any page
pub const INTERRUPTED_NO_PAGES: &str = "interrupted with no pages";

/// What the supervisor did with one crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeAction {
    /// `crawling → crawled`, processing queued
    Recovered { pages: u32 },
    /// `crawling → failed`
    FailedNoPages,
    /// Already `crawled`; processing queued again
    Requeued,
    /// `processing → crawled`, processing queued
    Reset { pages: u32 },
    /// The record moved on before the supervisor got to it
    Skipped { current: CrawlStatus },
    /// Reconciling failed; the crawl keeps its status until the next pass
    Errored(String),
}

/// Outcome of one supervisor pass
#[derive(Debug, Clone, Default)]
pub struct ResumeReport {
    pub actions: Vec<(String, ResumeAction)>,
}

impl ResumeReport {
    pub fn examined(&self) -> usize {
        self.actions.len()
    }

    /// Crawls whose processing stage was queued
    pub fn requeued(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, a)| {
                matches!(
                    a,
                    ResumeAction::Recovered { .. } | ResumeAction::Requeued | ResumeAction::Reset { .. }
                )
            })
            .count()
    }

    pub fn failed(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, a)| *a == ResumeAction::FailedNoPages)
            .count()
    }

    pub fn errored(&self) -> usize {
        self.actions
            .iter()
            .filter(|(_, a)| matches!(a, ResumeAction::Errored(_)))
            .count()
    }

    /// The action taken for a crawl, if it was examined
    pub fn action_for(&self, crawl_id: &str) -> Option<&ResumeAction> {
        self.actions
            .iter()
            .find(|(id, _)| id == crawl_id)
            .map(|(_, a)| a)
    }
}

/// What a process did before it started draining the queues
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    pub resume: ResumeReport,
    /// Enrich sweep jobs newly queued
    pub enrich_queued: usize,
}

/// Reconciles state left by a previous process
///
/// Resumes interrupted crawls after the grace period, then runs the enrich
/// sweep. Every command that drains the queues calls this first.
pub async fn recover_on_startup(ctx: &PipelineContext) -> Result<StartupReport, HarvestError> {
    let resume = resume_after_grace(ctx).await?;
    let enrich_queued = enqueue_enrich_candidates(ctx).await?;
    Ok(StartupReport {
        resume,
        enrich_queued,
    })
}

/// Waits for the configured grace period, then resumes interrupted crawls
pub async fn resume_after_grace(ctx: &PipelineContext) -> Result<ResumeReport, HarvestError> {
    let grace = Duration::from_secs(ctx.config().pipeline.resume_grace_secs);
    if !grace.is_zero() {
        tracing::debug!("Waiting {:?} before resuming crawls", grace);
        tokio::time::sleep(grace).await;
    }
    resume_interrupted_crawls(ctx).await
}

/// Reconciles every non-terminal discovery crawl
pub async fn resume_interrupted_crawls(ctx: &PipelineContext) -> Result<ResumeReport, HarvestError> {
    let incomplete = ctx.with_storage(|s| s.find_incomplete_crawls())?;
    tracing::info!("Found {} incomplete discovery crawls", incomplete.len());

    let mut report = ResumeReport::default();
    for record in &incomplete {
        let action = match resume_crawl(ctx, record).await {
            Ok(action) => {
                tracing::info!("Resume {}: {:?}", record.crawl_id, action);
                action
            }
            Err(e) => {
                tracing::error!("Resume {} failed: {}", record.crawl_id, e);
                ResumeAction::Errored(e.to_string())
            }
        };
        report.actions.push((record.crawl_id.clone(), action));
    }

    tracing::info!(
        "Resume finished: {} examined, {} queued for processing, {} failed, {} errors",
        report.examined(),
        report.requeued(),
        report.failed(),
        report.errored()
    );
    Ok(report)
}

async fn resume_crawl(ctx: &PipelineContext, record: &CrawlRecord) -> Result<ResumeAction, HarvestError> {
    let crawl_id = record.crawl_id.as_str();

    let action = match record.status {
        CrawlStatus::Crawling => {
            let pages = ctx.artifacts().count_pages(crawl_id)?;
            if pages == 0 {
                match ctx.with_storage(|s| s.mark_failed(crawl_id, INTERRUPTED_NO_PAGES))? {
                    TransitionOutcome::Applied => return Ok(ResumeAction::FailedNoPages),
                    TransitionOutcome::Stale { current } => {
                        return Ok(ResumeAction::Skipped { current })
                    }
                }
            }

            match ctx.with_storage(|s| s.mark_crawled(crawl_id, pages))? {
                TransitionOutcome::Applied => ResumeAction::Recovered { pages },
                TransitionOutcome::Stale { current } => {
                    return Ok(ResumeAction::Skipped { current })
                }
            }
        }
        CrawlStatus::Crawled => ResumeAction::Requeued,
        CrawlStatus::Processing => {
            let pages = ctx.artifacts().count_pages(crawl_id)?;
            match ctx.with_storage(|s| s.reset_to_crawled(crawl_id, pages))? {
                TransitionOutcome::Applied => ResumeAction::Reset { pages },
                TransitionOutcome::Stale { current } => {
                    return Ok(ResumeAction::Skipped { current })
                }
            }
        }
        CrawlStatus::Completed | CrawlStatus::Failed => {
            return Ok(ResumeAction::Skipped {
                current: record.status,
            })
        }
    };

    ctx.queue()
        .enqueue(Job::ProcessCrawl {
            crawl_id: crawl_id.to_string(),
        })
        .await?;
    Ok(action)
}
