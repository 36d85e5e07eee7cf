//! Discovery: the two ways businesses enter the pipeline
//!
//! - A discovery crawl fetches directory seed pages into page artifacts; a
//!   separate processing job turns them into businesses.
//! - An API discovery job asks a place source for candidates and records the
//!   attempt as a scrape job.

use crate::artifacts::PageArtifactSink;
use crate::crawler::{CrawlFailure, FetchError, SiteCrawlResult, VisitedUrls};
use crate::pipeline::jobs::Job;
use crate::pipeline::orchestrator::complete_stage;
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::pipeline::PipelineContext;
use crate::state::CrawlStatus;
use crate::storage::{InsertOutcome, ScrapeJobOutcome, Storage};
use crate::HarvestError;
use url::Url;

/// Creates a discovery crawl and queues its crawl phase
///
/// # Returns
///
/// The new crawl id
pub async fn start_discovery_crawl(
    ctx: &PipelineContext,
    seed_urls: &[String],
    max_pages: u32,
    region_id: i64,
    city_id: Option<i64>,
) -> Result<String, HarvestError> {
    let crawl_id =
        ctx.with_storage(|s| s.create_crawl(seed_urls, max_pages, region_id, city_id))?;
    tracing::info!(
        "Created discovery crawl {} ({} seeds, budget {} pages)",
        crawl_id,
        seed_urls.len(),
        max_pages
    );

    ctx.queue()
        .enqueue(Job::CrawlDiscovery {
            crawl_id: crawl_id.clone(),
        })
        .await?;
    Ok(crawl_id)
}

/// Runs the crawl phase of a discovery crawl
///
/// # Algorithm
///
/// 1. Skip unless the crawl is still `crawling`
/// 2. Crawl each seed with what is left of the page budget, writing one
///    page artifact per page and bumping `pages_crawled` after each seed.
///    One visited set spans all seeds: a seed or link already fetched for an
///    earlier seed is not fetched again.
/// 3. No pages at all: fail the crawl, or return a retryable error when a
///    seed was unreachable
/// 4. Otherwise write the crawl summary, mark it `crawled` and queue processing
///
/// A retried run continues numbering after the pages already on disk, spends
/// only the budget they left and treats their URLs as visited.
pub async fn run_discovery_crawl(ctx: &PipelineContext, crawl_id: &str) -> Result<(), HarvestError> {
    let record = ctx.with_storage(|s| s.get_crawl(crawl_id))?;
    if record.status != CrawlStatus::Crawling {
        tracing::info!("Crawl {} is already {}, nothing to fetch", crawl_id, record.status);
        return Ok(());
    }

    let artifacts = ctx.artifacts();
    let mut written = artifacts.count_pages(crawl_id)? as usize;
    let budget = record.max_pages as usize;

    let mut visited = VisitedUrls::new();
    if written > 0 {
        for page in artifacts.read_pages(crawl_id)? {
            if let Ok(url) = Url::parse(&page.url) {
                visited.insert(&url);
            }
        }
    }

    let mut transport_error: Option<FetchError> = None;
    let mut last_reason: Option<String> = None;

    for seed in &record.seed_urls {
        if written >= budget {
            tracing::debug!("Crawl {} spent its budget before seed {}", crawl_id, seed);
            break;
        }

        let target = match Url::parse(seed) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Crawl {}: skipping invalid seed {}: {}", crawl_id, seed, e);
                last_reason = Some(format!("invalid seed {}: {}", seed, e));
                continue;
            }
        };

        if visited.contains(&target) {
            tracing::debug!("Crawl {}: seed {} already fetched", crawl_id, seed);
            continue;
        }

        let crawler = ctx.site_crawler((budget - written) as u32)?;
        let mut sink = PageArtifactSink::for_crawl(artifacts, crawl_id, written);

        match crawler.crawl_with_visited(&target, &mut sink, &mut visited).await {
            Ok(result) => {
                tracing::debug!(
                    "Crawl {}: seed {} gave {} pages",
                    crawl_id,
                    seed,
                    result.pages_crawled()
                );
            }
            Err(CrawlFailure::NoSeedContent { url, reason }) => {
                tracing::warn!("Crawl {}: no content at {}: {}", crawl_id, url, reason);
                last_reason = Some(format!("{}: {}", url, reason));
            }
            Err(CrawlFailure::Transport(e)) => {
                tracing::warn!("Crawl {}: {}", crawl_id, e);
                last_reason = Some(e.to_string());
                transport_error = Some(e);
            }
            Err(CrawlFailure::Sink(e)) => return Err(*e),
        }

        written = sink.written();
        ctx.with_storage(|s| s.record_pages_crawled(crawl_id, written as u32))?;
    }

    if written == 0 {
        if let Some(e) = transport_error {
            return Err(e.into());
        }
        let reason = last_reason.unwrap_or_else(|| "no seed urls".to_string());
        ctx.with_storage(|s| s.mark_failed(crawl_id, &format!("no pages crawled: {}", reason)))?;
        return Ok(());
    }

    let pages = artifacts.read_pages(crawl_id)?;
    let summary = SiteCrawlResult::from_pages(pages).summary(ctx.config().crawler.excerpt_chars);
    artifacts.write_crawl_summary(crawl_id, &summary)?;

    if ctx
        .with_storage(|s| s.mark_crawled(crawl_id, written as u32))?
        .is_applied()
    {
        ctx.queue()
            .enqueue(Job::ProcessCrawl {
                crawl_id: crawl_id.to_string(),
            })
            .await?;
    }
    Ok(())
}

/// Counts from one API discovery job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub scrape_job_id: i64,
    pub found: u32,
    pub created: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Runs an API discovery job
///
/// Every candidate is inserted idempotently. New businesses start their
/// pipeline chain; existing ones stop here. The scrape job row gets exactly
/// one terminal outcome.
pub async fn run_api_discovery(
    ctx: &PipelineContext,
    query: &str,
    city_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<DiscoveryReport, HarvestError> {
    let source = ctx.places().name().to_string();
    let scrape_job_id = ctx.with_storage(|s| s.create_scrape_job(&source, query))?;
    let mut report = DiscoveryReport {
        scrape_job_id,
        ..Default::default()
    };

    let candidates = match ctx.places().search(query, city_id, category_id).await {
        Ok(candidates) => candidates,
        Err(e) => {
            let message = format!("{:#}", e);
            ctx.with_storage(|s| {
                s.finish_scrape_job(
                    scrape_job_id,
                    &ScrapeJobOutcome::Failed {
                        error: message.clone(),
                        found: 0,
                        created: 0,
                    },
                )
            })?;
            return Err(HarvestError::External {
                stage: Stage::Discovery,
                message,
            });
        }
    };

    report.found = candidates.len() as u32;
    let mut chained = Vec::new();
    let mut first_error = None;

    for mut candidate in candidates {
        candidate.city_id = candidate.city_id.or(city_id);
        candidate.category_id = candidate.category_id.or(category_id);

        match ctx.with_storage(|s| s.insert_business_if_absent(&candidate)) {
            Ok(InsertOutcome::Created(id)) => {
                report.created += 1;
                chained.push((id, StageOutcome::Completed));
            }
            Ok(InsertOutcome::Existing(id)) => {
                report.skipped += 1;
                chained.push((id, StageOutcome::Duplicate));
            }
            Err(e) => {
                tracing::warn!("Failed to store candidate {:?}: {}", candidate.name, e);
                report.failed += 1;
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    let outcome = match first_error {
        Some(error) => ScrapeJobOutcome::Failed {
            error,
            found: report.found,
            created: report.created,
        },
        None => ScrapeJobOutcome::Completed {
            found: report.found,
            created: report.created,
        },
    };
    ctx.with_storage(|s| s.finish_scrape_job(scrape_job_id, &outcome))?;

    for (business_id, outcome) in chained {
        complete_stage(ctx, business_id, Stage::Discovery, outcome).await?;
    }

    tracing::info!(
        "Discovery {:?} via {}: {} found, {} created, {} existing, {} failed",
        query,
        source,
        report.found,
        report.created,
        report.skipped,
        report.failed
    );
    Ok(report)
}
