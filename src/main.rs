//! Directory Harvester main entry point
//!
//! This is the command-line interface for the discovery and crawl pipeline.

use anyhow::Context;
use clap::{Parser, Subcommand};
use directory_harvester::config::{load_config_with_hash, Config};
use directory_harvester::crawler::crawl_site;
use directory_harvester::output::{load_statistics, print_statistics};
use directory_harvester::pipeline::discovery::start_discovery_crawl;
use directory_harvester::pipeline::supervisor::recover_on_startup;
use directory_harvester::pipeline::{InMemoryJobQueue, PipelineContext, Worker};
use directory_harvester::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Directory Harvester: discovery and crawl engine for a local business directory
///
/// Finds candidate businesses by crawling directory pages, crawls each
/// business website, and carries every business through the research stages.
#[derive(Parser, Debug)]
#[command(name = "directory-harvester")]
#[command(version)]
#[command(about = "Discovery and crawl engine for a local business directory", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl one website and write its summary
    CrawlSite {
        /// Website to crawl
        url: String,

        /// Where to write the summary JSON (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a discovery crawl and run the pipeline until the queues are idle
    ///
    /// Crawls interrupted by an earlier run are resumed first.
    Discover {
        /// Region the crawl belongs to
        #[arg(long)]
        region: i64,

        /// City within the region
        #[arg(long)]
        city: Option<i64>,

        /// Seed URL (repeatable)
        #[arg(long = "seed", required = true)]
        seeds: Vec<String>,

        /// Page budget for the crawl (defaults to crawler.max-pages)
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Resume interrupted discovery crawls, report them, then drain the queues
    Resume,

    /// Resume interrupted crawls, queue due enrichment work and drain the queues
    Work,

    /// Show lifecycle statistics from the database
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::CrawlSite { url, output } => handle_crawl_site(&config, &url, output.as_deref()).await,
        Command::Discover {
            region,
            city,
            seeds,
            max_pages,
        } => handle_discover(config, region, city, seeds, max_pages).await,
        Command::Resume => handle_resume(config).await,
        Command::Work => handle_work(config).await,
        Command::Status => handle_status(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("directory_harvester=info,warn"),
            1 => EnvFilter::new("directory_harvester=debug,info"),
            2 => EnvFilter::new("directory_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn build_context(config: Config) -> anyhow::Result<Arc<PipelineContext>> {
    let storage = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("failed to open {}", config.storage.database_path))?;
    let queue = Arc::new(InMemoryJobQueue::new(config.pipeline.max_attempts));
    Ok(Arc::new(PipelineContext::new(config, storage, queue)?))
}

async fn drain(ctx: &Arc<PipelineContext>) -> anyhow::Result<()> {
    let report = Worker::new(Arc::clone(ctx)).run_until_idle().await?;
    if report.exhausted > 0 {
        tracing::warn!("{} jobs failed permanently", report.exhausted);
    }
    Ok(())
}

/// Handles `crawl-site`: one-off crawl of a single website
async fn handle_crawl_site(config: &Config, url: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let target = Url::parse(url).with_context(|| format!("invalid url {}", url))?;
    let result = crawl_site(config, &target).await?;

    let summary = serde_json::to_string_pretty(&result.summary(config.crawler.excerpt_chars))?;
    match output {
        Some(path) => {
            std::fs::write(path, summary)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!(
                "✓ {} pages from {} written to {}",
                result.pages_crawled(),
                target,
                path.display()
            );
        }
        None => println!("{}", summary),
    }
    Ok(())
}

/// Handles `discover`: resumes earlier crawls, creates a discovery crawl and
/// runs the pipeline
async fn handle_discover(
    config: Config,
    region: i64,
    city: Option<i64>,
    seeds: Vec<String>,
    max_pages: Option<u32>,
) -> anyhow::Result<()> {
    let max_pages = max_pages.unwrap_or(config.crawler.max_pages);
    let ctx = build_context(config)?;
    recover_on_startup(&ctx).await?;

    let crawl_id = start_discovery_crawl(&ctx, &seeds, max_pages, region, city).await?;
    drain(&ctx).await?;

    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id))?;
    println!("Crawl {}: {}", record.crawl_id, record.status);
    println!("  Pages crawled: {}", record.pages_crawled);
    println!(
        "  Businesses: {} created, {} skipped, {} failed",
        record.businesses_created, record.businesses_skipped, record.businesses_failed
    );
    if let Some(error) = record.error {
        println!("  Error: {}", error);
    }
    Ok(())
}

/// Handles `resume`: runs the resume supervisor, then drains the queues
async fn handle_resume(config: Config) -> anyhow::Result<()> {
    let ctx = build_context(config)?;

    let report = recover_on_startup(&ctx).await?.resume;
    println!(
        "Resumed {} crawls: {} queued for processing, {} failed, {} errors",
        report.examined(),
        report.requeued(),
        report.failed(),
        report.errored()
    );

    drain(&ctx).await
}

/// Handles `work`: reconciles earlier runs and drains the queues
async fn handle_work(config: Config) -> anyhow::Result<()> {
    let ctx = build_context(config)?;
    let startup = recover_on_startup(&ctx).await?;
    tracing::info!(
        "Resumed {} crawls, queued {} enrichment jobs",
        startup.resume.examined(),
        startup.enrich_queued
    );
    drain(&ctx).await
}

/// Handles `status`: shows statistics from the database
fn handle_status(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}
