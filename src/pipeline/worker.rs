//! Queue worker: claims jobs and dispatches them to stage handlers
//!
//! Each named queue has its own concurrency limit. A job that exhausts its
//! attempts drives the record it owns to `failed` so nothing is left stuck
//! mid-lifecycle. Queue bookkeeping errors and panicked tasks are logged and
//! counted; the worker keeps draining so in-flight jobs are never aborted.

use crate::pipeline::discovery::{run_api_discovery, run_discovery_crawl};
use crate::pipeline::jobs::{Job, QueueName};
use crate::pipeline::orchestrator::run_business_stage;
use crate::pipeline::processing::process_crawl;
use crate::pipeline::queue::{ClaimedJob, FailureDisposition};
use crate::pipeline::PipelineContext;
use crate::state::CrawlStatus;
use crate::storage::Storage;
use crate::HarvestError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Tally of one `run_until_idle` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub succeeded: u32,
    pub retried: u32,
    pub exhausted: u32,
    /// Jobs whose outcome could not be recorded, or whose task panicked
    pub errors: u32,
}

enum JobResult {
    Succeeded,
    Retried,
    Exhausted,
}

/// Drains the job queues with bounded concurrency per queue
pub struct Worker {
    ctx: Arc<PipelineContext>,
    limits: HashMap<QueueName, Arc<Semaphore>>,
}

impl Worker {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        let queues = &ctx.config().queues;
        let limits = HashMap::from([
            (
                QueueName::Scraper,
                Arc::new(Semaphore::new(queues.scraper_concurrency)),
            ),
            (
                QueueName::Research,
                Arc::new(Semaphore::new(queues.research_concurrency)),
            ),
        ]);
        Self { ctx, limits }
    }

    /// Runs jobs until every queue is empty and nothing is in flight
    ///
    /// Jobs queued by running jobs are picked up in the same call.
    pub async fn run_until_idle(&self) -> Result<WorkerReport, HarvestError> {
        let mut report = WorkerReport::default();
        let mut tasks = JoinSet::new();

        loop {
            for queue in QueueName::all() {
                let Some(limit) = self.limits.get(&queue) else {
                    continue;
                };

                while let Ok(permit) = Arc::clone(limit).try_acquire_owned() {
                    let claimed = match self.ctx.queue().claim(queue).await {
                        Ok(Some(claimed)) => claimed,
                        Ok(None) => break,
                        Err(e) => {
                            tracing::error!("Failed to claim from {}: {}", queue, e);
                            report.errors += 1;
                            break;
                        }
                    };

                    tracing::debug!(
                        "Claimed {} on {} (attempt {})",
                        claimed.job,
                        queue,
                        claimed.attempt
                    );
                    let ctx = Arc::clone(&self.ctx);
                    tasks.spawn(async move {
                        let result = execute(&ctx, claimed).await;
                        drop(permit);
                        result
                    });
                }
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            match joined {
                Ok(Ok(JobResult::Succeeded)) => report.succeeded += 1,
                Ok(Ok(JobResult::Retried)) => report.retried += 1,
                Ok(Ok(JobResult::Exhausted)) => report.exhausted += 1,
                Ok(Err(e)) => {
                    tracing::error!("Job bookkeeping failed: {}", e);
                    report.errors += 1;
                }
                Err(e) => {
                    tracing::error!("Worker task panicked: {}", e);
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            "Queues idle: {} succeeded, {} retried, {} exhausted, {} errors",
            report.succeeded,
            report.retried,
            report.exhausted,
            report.errors
        );
        Ok(report)
    }
}

async fn execute(ctx: &PipelineContext, claimed: ClaimedJob) -> Result<JobResult, HarvestError> {
    let error = match dispatch(ctx, &claimed.job).await {
        Ok(()) => {
            ctx.queue().mark_succeeded(claimed.id).await?;
            return Ok(JobResult::Succeeded);
        }
        Err(e) => e,
    };

    let message = error.to_string();
    match ctx
        .queue()
        .mark_failed(claimed.id, &message, error.is_retryable())
        .await?
    {
        FailureDisposition::Retry { attempt } => {
            tracing::warn!("{} failed on attempt {}, will retry: {}", claimed.job, attempt, message);
            Ok(JobResult::Retried)
        }
        FailureDisposition::Exhausted { attempts } => {
            let reason = format!(
                "{} failed after {} attempt(s): {}",
                claimed.job.job_type(),
                attempts,
                message
            );
            tracing::error!("{}: {}", claimed.job, reason);
            fail_owner(ctx, &claimed.job, &reason)?;
            Ok(JobResult::Exhausted)
        }
    }
}

async fn dispatch(ctx: &PipelineContext, job: &Job) -> Result<(), HarvestError> {
    match job {
        Job::Discovery {
            query,
            city_id,
            category_id,
        } => run_api_discovery(ctx, query, *city_id, *category_id)
            .await
            .map(|_| ()),
        Job::CrawlDiscovery { crawl_id } => run_discovery_crawl(ctx, crawl_id).await,
        Job::ProcessCrawl { crawl_id } => process_crawl(ctx, crawl_id).await.map(|_| ()),
        Job::WebsiteCrawl { .. } | Job::WebSearch { .. } | Job::Enrich { .. } | Job::Translate { .. } => {
            match job.business_stage() {
                Some((stage, business_id)) => run_business_stage(ctx, stage, business_id)
                    .await
                    .map(|_| ()),
                None => Ok(()),
            }
        }
    }
}

/// Moves the record an exhausted job owned into `failed`
fn fail_owner(ctx: &PipelineContext, job: &Job, reason: &str) -> Result<(), HarvestError> {
    if let Some(crawl_id) = job.crawl_id() {
        return ctx.with_storage(|s| {
            let record = s.get_crawl(crawl_id)?;
            // crawled may only move forward into processing
            if record.status == CrawlStatus::Crawled {
                s.mark_processing(crawl_id)?;
            }
            if !record.status.is_terminal() {
                s.mark_failed(crawl_id, reason)?;
            }
            Ok(())
        });
    }

    if let Some((_, business_id)) = job.business_stage() {
        ctx.with_storage(|s| s.fail_business(business_id, reason))?;
    }
    Ok(())
}
