//! Processing phase of a discovery crawl: page artifacts to businesses
//!
//! Safe to repeat in full. Business creation is keyed on the source key, so a
//! rerun after an interrupted pass skips what the first pass created and
//! picks the chain back up for businesses still `pending`.

use crate::crawler::CrawledPage;
use crate::pipeline::orchestrator::complete_stage;
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::pipeline::PipelineContext;
use crate::state::{BusinessStatus, CrawlStatus};
use crate::storage::{BusinessCounts, InsertOutcome, NewBusiness, Storage, TransitionOutcome};
use crate::url::parse_website;
use crate::HarvestError;
use serde_json::Value;
use std::collections::HashSet;

/// Candidates pulled from a crawl's structured data
#[derive(Debug, Default)]
pub struct Extraction {
    pub candidates: Vec<NewBusiness>,
    /// Records with no usable name
    pub unnamed: u32,
}

/// Turns allow-listed structured-data records into business candidates
///
/// Repeated records (same source key) are kept once.
pub fn extract_candidates(pages: &[CrawledPage], city_id: Option<i64>) -> Extraction {
    let mut extraction = Extraction::default();
    let mut seen = HashSet::new();

    for record in pages.iter().flat_map(|p| p.structured_data.iter()) {
        let Some(name) = record_name(record) else {
            extraction.unnamed += 1;
            continue;
        };

        let candidate = NewBusiness {
            name,
            website: record_website(record),
            city_id,
            category_id: None,
        };

        if seen.insert(candidate.source_key()) {
            extraction.candidates.push(candidate);
        }
    }

    extraction
}

fn record_name(record: &Value) -> Option<String> {
    let name = record.get("name")?.as_str()?;
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    (!name.is_empty()).then_some(name)
}

fn record_website(record: &Value) -> Option<String> {
    let direct = record.get("url").and_then(Value::as_str);
    let same_as = match record.get("sameAs") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    direct
        .into_iter()
        .chain(same_as)
        .find_map(parse_website)
        .map(|url| url.to_string())
}

/// Runs the processing phase of a discovery crawl
///
/// # Algorithm
///
/// 1. `crawled → processing` (a crawl already `processing` is a rerun)
/// 2. Read the page artifacts and extract candidates
/// 3. Insert each candidate; new ones, and existing ones still `pending`,
///    continue to the website crawl stage
/// 4. `processing → completed` with the counts
///
/// # Returns
///
/// The counts, or None when the crawl was already finished
pub async fn process_crawl(
    ctx: &PipelineContext,
    crawl_id: &str,
) -> Result<Option<BusinessCounts>, HarvestError> {
    match ctx.with_storage(|s| s.mark_processing(crawl_id))? {
        TransitionOutcome::Applied => {}
        TransitionOutcome::Stale {
            current: CrawlStatus::Processing,
        } => {
            tracing::info!("Crawl {} already processing, running extraction again", crawl_id);
        }
        TransitionOutcome::Stale { current } => {
            tracing::info!("Crawl {} is {}, nothing to process", crawl_id, current);
            return Ok(None);
        }
    }

    let record = ctx.with_storage(|s| s.get_crawl(crawl_id))?;
    let pages = ctx.artifacts().read_pages(crawl_id)?;
    let extraction = extract_candidates(&pages, record.city_id);
    tracing::info!(
        "Crawl {}: {} pages, {} candidates, {} unnamed records",
        crawl_id,
        pages.len(),
        extraction.candidates.len(),
        extraction.unnamed
    );

    let mut counts = BusinessCounts {
        skipped: extraction.unnamed,
        ..Default::default()
    };

    for candidate in &extraction.candidates {
        let inserted = ctx.with_storage(|s| {
            let outcome = s.insert_business_if_absent(candidate)?;
            let status = s.get_business(outcome.id())?.status;
            Ok((outcome, status))
        });

        let (business_id, continue_chain) = match inserted {
            Ok((InsertOutcome::Created(id), _)) => {
                counts.created += 1;
                (id, true)
            }
            Ok((InsertOutcome::Existing(id), status)) => {
                counts.skipped += 1;
                (id, status == BusinessStatus::Pending)
            }
            Err(e) => {
                tracing::warn!("Crawl {}: failed to store {:?}: {}", crawl_id, candidate.name, e);
                counts.failed += 1;
                continue;
            }
        };

        let outcome = if continue_chain {
            StageOutcome::Completed
        } else {
            StageOutcome::Duplicate
        };
        complete_stage(ctx, business_id, Stage::Discovery, outcome).await?;
    }

    ctx.with_storage(|s| s.mark_completed(crawl_id, counts))?;
    Ok(Some(counts))
}
