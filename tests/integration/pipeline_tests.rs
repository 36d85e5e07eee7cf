//! Integration tests for the discovery pipeline
//!
//! These tests run the stage handlers, the resume supervisor and the worker
//! against a SQLite file and an artifact directory in a temp dir, with
//! wiremock standing in for directory pages and business websites.

use directory_harvester::config::{parse_config, Config};
use directory_harvester::crawler::CrawledPage;
use directory_harvester::output::load_statistics;
use directory_harvester::pipeline::discovery::{run_discovery_crawl, start_discovery_crawl};
use directory_harvester::pipeline::orchestrator::run_business_stage;
use directory_harvester::pipeline::processing::process_crawl;
use directory_harvester::pipeline::supervisor::{
    recover_on_startup, resume_interrupted_crawls, INTERRUPTED_NO_PAGES,
};
use directory_harvester::pipeline::{
    InMemoryJobQueue, Job, JobQueue, NextAction, PipelineContext, QueueName, ResumeAction, Stage,
    Worker,
};
use directory_harvester::state::{BusinessStatus, CrawlStatus};
use directory_harvester::storage::{open_storage, NewBusiness, Storage};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn database_path(dir: &TempDir) -> PathBuf {
    dir.path().join("harvester.db")
}

fn create_test_config(dir: &TempDir, max_attempts: u32) -> Config {
    parse_config(&format!(
        r#"
[fetcher]
politeness-delay-ms = 0
timeout-secs = 5

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[crawler]
site-max-pages = 3

[storage]
database-path = '{}'
artifacts-dir = '{}'

[pipeline]
resume-grace-secs = 0
max-attempts = {}
"#,
        database_path(dir).display(),
        dir.path().join("artifacts").display(),
        max_attempts
    ))
    .expect("Failed to parse test config")
}

fn create_context(dir: &TempDir, max_attempts: u32) -> (Arc<PipelineContext>, Arc<InMemoryJobQueue>) {
    let config = create_test_config(dir, max_attempts);
    let storage = open_storage(&database_path(dir)).expect("Failed to open storage");
    let queue = Arc::new(InMemoryJobQueue::new(max_attempts));
    let ctx = PipelineContext::new(config, storage, queue.clone()).expect("Failed to build context");
    (Arc::new(ctx), queue)
}

fn insert_business(ctx: &PipelineContext, name: &str, website: Option<String>) -> i64 {
    ctx.with_storage(|s| {
        s.insert_business_if_absent(&NewBusiness {
            name: name.to_string(),
            website,
            city_id: Some(1),
            category_id: None,
        })
    })
    .unwrap()
    .id()
}

fn directory_page(records: &[serde_json::Value]) -> String {
    let scripts: String = records
        .iter()
        .map(|r| format!(r#"<script type="application/ld+json">{}</script>"#, r))
        .collect();
    format!(
        "<html><head><title>Local Directory</title>{}</head><body><h1>Listings</h1></body></html>",
        scripts
    )
}

async fn mount_html(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
            "text/html",
        ))
        .mount(server)
        .await;
}

/// How many times the mock server saw a request for `page_path`
async fn request_count(server: &MockServer, page_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == page_path)
        .count()
}

fn page_with_records(url: &str, records: Vec<serde_json::Value>) -> CrawledPage {
    let mut page = CrawledPage::from_parsed(url.to_string(), 200, Default::default());
    page.structured_data = records;
    page
}

#[tokio::test]
async fn test_business_without_website_moves_to_web_search() {
    let dir = TempDir::new().unwrap();
    let (ctx, queue) = create_context(&dir, 3);
    let id = insert_business(&ctx, "Corner Shop", None);

    let next = run_business_stage(&ctx, Stage::WebsiteCrawl, id).await.unwrap();

    assert_eq!(next, NextAction::Enqueue(Stage::WebSearch));
    let business = ctx.with_storage(|s| s.get_business(id)).unwrap();
    assert_eq!(business.status, BusinessStatus::Researching);
    assert_eq!(
        queue.pending_jobs(QueueName::Research),
        vec![Job::WebSearch { business_id: id }]
    );
}

#[tokio::test]
async fn test_missing_website_records_empty_summary_and_continues() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (ctx, _queue) = create_context(&dir, 3);
    let id = insert_business(&ctx, "Gone Bistro", Some(format!("{}/", server.uri())));

    let next = run_business_stage(&ctx, Stage::WebsiteCrawl, id).await.unwrap();

    assert_eq!(next, NextAction::Enqueue(Stage::WebSearch));
    let summary = ctx.artifacts().read_business_summary(id).unwrap().unwrap();
    assert_eq!(summary.pages_crawled, 0);
    let business = ctx.with_storage(|s| s.get_business(id)).unwrap();
    assert_eq!(business.status, BusinessStatus::Researching);
}

#[tokio::test]
async fn test_website_crawl_writes_page_artifacts() {
    let server = MockServer::start().await;
    mount_html(&server, "/", r#"<h1>Harbour Cafe</h1><a href="/about">About</a>"#).await;
    mount_html(&server, "/about", "<p>Family run since 1952.</p>").await;

    let dir = TempDir::new().unwrap();
    let (ctx, _queue) = create_context(&dir, 3);
    let id = insert_business(&ctx, "Harbour Cafe", Some(format!("{}/", server.uri())));
    // left over from a longer earlier attempt
    let stale = page_with_records("https://harbour.example/old", vec![]);
    std::fs::create_dir_all(ctx.artifacts().business_dir(id)).unwrap();
    std::fs::write(
        ctx.artifacts().business_page_path(id, 2),
        serde_json::to_vec(&stale).unwrap(),
    )
    .unwrap();

    let next = run_business_stage(&ctx, Stage::WebsiteCrawl, id).await.unwrap();

    assert_eq!(next, NextAction::Enqueue(Stage::WebSearch));
    assert!(ctx.artifacts().business_page_path(id, 0).exists());
    assert!(ctx.artifacts().business_page_path(id, 1).exists());
    let urls: Vec<String> = ctx
        .artifacts()
        .read_business_pages(id)
        .unwrap()
        .into_iter()
        .map(|p| p.url)
        .collect();
    assert_eq!(
        urls,
        vec![format!("{}/", server.uri()), format!("{}/about", server.uri())]
    );
    let summary = ctx.artifacts().read_business_summary(id).unwrap().unwrap();
    assert_eq!(summary.pages_crawled, 2);
}

#[tokio::test]
async fn test_discovery_seeds_never_fetch_a_page_twice() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/page1",
        r#"<a href="/about">About</a><a href="/page2">More listings</a>"#,
    )
    .await;
    mount_html(&server, "/page2", r#"<a href="/about">About</a>"#).await;
    mount_html(&server, "/about", "<p>About this directory.</p>").await;

    let dir = TempDir::new().unwrap();
    let (ctx, queue) = create_context(&dir, 3);
    let seeds = vec![
        format!("{}/page1", server.uri()),
        format!("{}/page2", server.uri()),
    ];
    let crawl_id = ctx
        .with_storage(|s| s.create_crawl(&seeds, 10, 1, None))
        .unwrap();

    run_discovery_crawl(&ctx, &crawl_id).await.unwrap();

    assert_eq!(request_count(&server, "/page1").await, 1);
    assert_eq!(request_count(&server, "/page2").await, 1);
    assert_eq!(request_count(&server, "/about").await, 1);

    assert_eq!(ctx.artifacts().count_pages(&crawl_id).unwrap(), 3);
    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Crawled);
    assert_eq!(record.pages_crawled, 3);
    assert_eq!(
        queue.pending_jobs(QueueName::Scraper),
        vec![Job::ProcessCrawl { crawl_id }]
    );
}

#[tokio::test]
async fn test_interrupted_crawl_without_pages_fails_on_resume() {
    let dir = TempDir::new().unwrap();
    let (ctx, queue) = create_context(&dir, 3);
    let crawl_id = ctx
        .with_storage(|s| s.create_crawl(&["https://directory.example/".to_string()], 10, 1, None))
        .unwrap();

    let report = resume_interrupted_crawls(&ctx).await.unwrap();

    assert_eq!(report.action_for(&crawl_id), Some(&ResumeAction::FailedNoPages));
    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Failed);
    assert_eq!(record.error.as_deref(), Some(INTERRUPTED_NO_PAGES));
    assert!(record.completed_at.is_some());
    assert!(queue.pending_jobs(QueueName::Scraper).is_empty());
}

#[tokio::test]
async fn test_resume_twice_queues_processing_once() {
    let dir = TempDir::new().unwrap();
    let (ctx, queue) = create_context(&dir, 3);
    let crawl_id = ctx
        .with_storage(|s| s.create_crawl(&["https://directory.example/".to_string()], 10, 1, None))
        .unwrap();
    for i in 0..3 {
        let page = page_with_records(&format!("https://directory.example/{}", i), vec![]);
        ctx.artifacts().write_page(&crawl_id, i, &page).unwrap();
    }

    resume_interrupted_crawls(&ctx).await.unwrap();
    resume_interrupted_crawls(&ctx).await.unwrap();

    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Crawled);
    assert_eq!(record.pages_crawled, 3);
    assert_eq!(
        queue.pending_jobs(QueueName::Scraper),
        vec![Job::ProcessCrawl { crawl_id }]
    );
}

#[tokio::test]
async fn test_worker_start_finishes_interrupted_crawl() {
    let dir = TempDir::new().unwrap();
    let (ctx, _queue) = create_context(&dir, 3);
    let crawl_id = ctx
        .with_storage(|s| s.create_crawl(&["https://directory.example/".to_string()], 10, 1, None))
        .unwrap();
    let page = page_with_records(
        "https://directory.example/",
        vec![json!({"@type": "Restaurant", "name": "Trattoria Roma"})],
    );
    ctx.artifacts().write_page(&crawl_id, 0, &page).unwrap();

    let startup = recover_on_startup(&ctx).await.unwrap();
    let report = Worker::new(Arc::clone(&ctx)).run_until_idle().await.unwrap();

    assert_eq!(
        startup.resume.action_for(&crawl_id),
        Some(&ResumeAction::Recovered { pages: 1 })
    );
    // processing, then four stages for the one business
    assert_eq!(report.succeeded, 5);
    assert_eq!(report.errors, 0);
    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Completed);
    assert_eq!(record.businesses_created, 1);
}

#[tokio::test]
async fn test_reprocessing_after_interruption_creates_no_duplicates() {
    let dir = TempDir::new().unwrap();
    let (ctx, queue) = create_context(&dir, 3);
    let crawl_id = ctx
        .with_storage(|s| s.create_crawl(&["https://directory.example/".to_string()], 10, 1, Some(7)))
        .unwrap();
    let page = page_with_records(
        "https://directory.example/",
        vec![
            json!({"@type": "Bakery", "name": "Bäckerei Huber", "url": "https://huber.example/"}),
            json!({"@type": "Restaurant", "name": "Trattoria Roma"}),
        ],
    );
    ctx.artifacts().write_page(&crawl_id, 0, &page).unwrap();
    ctx.with_storage(|s| s.mark_crawled(&crawl_id, 1)).unwrap();

    // First pass stored one business, then the process died mid-extraction
    ctx.with_storage(|s| s.mark_processing(&crawl_id)).unwrap();
    insert_business(&ctx, "Bäckerei Huber", Some("https://huber.example/".to_string()));

    let report = resume_interrupted_crawls(&ctx).await.unwrap();
    assert_eq!(report.action_for(&crawl_id), Some(&ResumeAction::Reset { pages: 1 }));

    let counts = process_crawl(&ctx, &crawl_id).await.unwrap().unwrap();
    assert_eq!(counts.created, 1);
    assert_eq!(counts.skipped, 1);

    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Completed);
    assert_eq!(record.businesses_created, 1);

    let pending = ctx
        .with_storage(|s| s.count_businesses_by_status(BusinessStatus::Pending))
        .unwrap();
    assert_eq!(pending, 2);
    // Both were still pending, so both continue to the website crawl
    let website_jobs = queue
        .pending_jobs(QueueName::Scraper)
        .into_iter()
        .filter(|j| matches!(j, Job::WebsiteCrawl { .. }))
        .count();
    assert_eq!(website_jobs, 2);

    // A stale processing job after completion does nothing
    assert!(process_crawl(&ctx, &crawl_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_discovery_crawl_end_to_end() {
    let server = MockServer::start().await;
    let bakery_site = format!("{}/bakery", server.uri());
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            directory_page(&[
                json!({"@context": "https://schema.org", "@type": "Bakery", "name": "Bäckerei Huber", "url": bakery_site}),
                json!({"@context": "https://schema.org", "@type": "Restaurant", "name": "Trattoria Roma"}),
                json!({"@context": "https://schema.org", "@type": "Event", "name": "Street Festival"}),
            ]),
            "text/html",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bakery"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html lang=\"en\"><head><title>Bäckerei Huber</title></head><body><p>Fresh bread daily.</p></body></html>",
            "text/html",
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (ctx, _queue) = create_context(&dir, 3);
    let seeds = vec![format!("{}/", server.uri())];

    let crawl_id = start_discovery_crawl(&ctx, &seeds, 5, 1, Some(7)).await.unwrap();
    let report = Worker::new(Arc::clone(&ctx)).run_until_idle().await.unwrap();

    // crawl, process, then four stages for each of the two businesses
    assert_eq!(report.succeeded, 10);
    assert_eq!(report.exhausted, 0);

    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Completed);
    assert_eq!(record.pages_crawled, 1);
    assert_eq!(record.businesses_created, 2);
    assert!(record.crawl_finished_at.is_some());
    assert!(record.processing_started_at.is_some());
    assert!(record.completed_at.is_some());

    assert!(ctx.artifacts().crawl_dir(&crawl_id).join("summary.json").exists());

    // A second connection sees the committed state
    let storage = open_storage(&database_path(&dir)).unwrap();
    let stats = load_statistics(&storage).unwrap();
    assert_eq!(stats.crawls(CrawlStatus::Completed), 1);
    assert_eq!(stats.total_businesses, 2);
    assert_eq!(stats.businesses(BusinessStatus::Enriched), 2);
}

#[tokio::test]
async fn test_unreachable_seed_fails_crawl_after_retries() {
    let dir = TempDir::new().unwrap();
    let (ctx, _queue) = create_context(&dir, 2);

    let crawl_id = start_discovery_crawl(&ctx, &["http://127.0.0.1:1/".to_string()], 5, 1, None)
        .await
        .unwrap();
    let report = Worker::new(Arc::clone(&ctx)).run_until_idle().await.unwrap();

    assert_eq!(report.retried, 1);
    assert_eq!(report.exhausted, 1);
    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Failed);
    assert!(record
        .error
        .unwrap()
        .contains("crawl_discovery failed after 2 attempt(s)"));
}

#[tokio::test]
async fn test_retried_crawl_keeps_pages_already_written() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            directory_page(&[json!({"@type": "Hotel", "name": "Seaview"})]),
            "text/html",
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (ctx, queue) = create_context(&dir, 3);
    let crawl_id = ctx
        .with_storage(|s| s.create_crawl(&[format!("{}/", server.uri())], 2, 1, None))
        .unwrap();
    // An earlier attempt wrote one page before dying
    let earlier = page_with_records("https://directory.example/", vec![]);
    ctx.artifacts().write_page(&crawl_id, 0, &earlier).unwrap();

    run_discovery_crawl(&ctx, &crawl_id).await.unwrap();

    assert_eq!(ctx.artifacts().count_pages(&crawl_id).unwrap(), 2);
    let record = ctx.with_storage(|s| s.get_crawl(&crawl_id)).unwrap();
    assert_eq!(record.status, CrawlStatus::Crawled);
    assert_eq!(record.pages_crawled, 2);
    assert_eq!(queue.outstanding(QueueName::Scraper).await.unwrap(), 1);
}
