//! Integration tests for the site crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full fetch, prioritize and aggregate cycle end-to-end.

use directory_harvester::config::{
    Config, CrawlerConfig, FetcherConfig, PipelineConfig, PriorityEntry, QueueConfig,
    StorageConfig, UserAgentConfig,
};
use directory_harvester::crawler::crawl_site;
use directory_harvester::HarvestError;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with no politeness delay
fn create_test_config(site_max_pages: u32) -> Config {
    Config {
        fetcher: FetcherConfig {
            timeout_secs: 5,
            max_redirects: 5,
            politeness_delay_ms: 0,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        crawler: CrawlerConfig {
            site_max_pages,
            ..CrawlerConfig::default()
        },
        storage: StorageConfig {
            database_path: ":memory:".to_string(),
            artifacts_dir: "./artifacts".to_string(),
        },
        pipeline: PipelineConfig::default(),
        queues: QueueConfig::default(),
        priority_table: None,
        priority: vec![],
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><head><title>Test</title></head><body>{}</body></html>", body),
        "text/html",
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Paths requested from the mock server, in arrival order
async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

fn seed(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).expect("Failed to parse mock server URL")
}

#[tokio::test]
async fn test_seed_with_two_links_yields_three_pages() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<h1>Harbour Cafe</h1><a href="/about">About</a><a href="/contact">Contact</a>"#,
    )
    .await;
    mount_page(&server, "/about", "<p>Family run since 1952.</p>").await;
    mount_page(&server, "/contact", "<p>Call us.</p>").await;

    let config = create_test_config(3);
    let result = crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(result.pages_crawled(), 3);
    assert_eq!(result.summary(100).pages_crawled, 3);
    assert!(result.total_content_length > 0);
}

#[tokio::test]
async fn test_links_visited_in_priority_order() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/contact">Contact</a><a href="/random">Random</a><a href="/about">About</a>"#,
    )
    .await;
    mount_page(&server, "/contact", "<p>contact</p>").await;
    mount_page(&server, "/random", "<p>random</p>").await;
    mount_page(&server, "/about", "<p>about</p>").await;

    let mut config = create_test_config(4);
    config.priority = vec![PriorityEntry::new("about", 10), PriorityEntry::new("contact", 7)];

    crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(
        requested_paths(&server).await,
        vec!["/", "/about", "/contact", "/random"]
    );
}

#[tokio::test]
async fn test_budget_of_one_fetches_only_the_seed() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/about">About</a><a href="/contact">Contact</a>"#,
    )
    .await;
    mount_page(&server, "/about", "<p>about</p>").await;
    mount_page(&server, "/contact", "<p>contact</p>").await;

    let config = create_test_config(1);
    let result = crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(result.pages_crawled(), 1);
    assert_eq!(requested_paths(&server).await, vec!["/"]);
}

#[tokio::test]
async fn test_url_variants_are_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"
        <a href="/about">About</a>
        <a href="/about/">About again</a>
        <a href="/About#team">Team</a>
        <a href="/about?utm_source=newsletter">Tracked</a>
        <a href="/">Home</a>
        "#,
    )
    .await;
    mount_page(&server, "/about", "<p>about</p>").await;

    let config = create_test_config(10);
    let result = crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(result.pages_crawled(), 2);
    assert_eq!(requested_paths(&server).await, vec!["/", "/about"]);
}

#[tokio::test]
async fn test_excluded_links_are_not_requested() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"
        <a href="/menu.pdf">Menu (PDF)</a>
        <a href="/wp-admin/">Admin</a>
        <a href="/cart">Cart</a>
        <a href="mailto:hello@example.com">Mail</a>
        <a href="https://elsewhere.example/about">Partner</a>
        "#,
    )
    .await;

    let config = create_test_config(10);
    let result = crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(result.pages_crawled(), 1);
    assert_eq!(requested_paths(&server).await, vec!["/"]);
}

#[tokio::test]
async fn test_seed_without_links_succeeds_with_one_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<p>Just a landing page.</p>").await;

    let config = create_test_config(10);
    let result = crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(result.pages_crawled(), 1);
    assert!(!result.is_empty());
}

#[tokio::test]
async fn test_missing_seed_is_no_seed_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = create_test_config(10);
    let err = crawl_site(&config, &seed(&server)).await.unwrap_err();

    assert!(matches!(err, HarvestError::NoSeedContent { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_failing_page_is_skipped() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/about">About</a><a href="/team">Team</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "/team", "<p>Our team</p>").await;

    let config = create_test_config(10);
    let result = crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(result.pages_crawled(), 2);
    assert!(result.pages.iter().all(|p| !p.url.ends_with("/about")));
}

#[tokio::test]
async fn test_non_html_seed_is_no_seed_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .mount(&server)
        .await;

    let config = create_test_config(10);
    let err = crawl_site(&config, &seed(&server)).await.unwrap_err();

    assert!(matches!(err, HarvestError::NoSeedContent { .. }));
}

#[tokio::test]
async fn test_aggregates_language_structured_data_and_social_proof() {
    let server = MockServer::start().await;
    let seed_body = r#"<!doctype html>
<html lang="de">
<head>
  <title>Bäckerei Huber</title>
  <meta name="description" content="Brot seit 1952">
  <script type="application/ld+json">
    {"@context": "https://schema.org", "@type": "Bakery", "name": "Bäckerei Huber"}
  </script>
</head>
<body>
  <h1>Willkommen</h1>
  <blockquote>The best sourdough in the whole district, every single morning.</blockquote>
  <a href="/en/">English</a>
</body>
</html>"#;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(seed_body, "text/html"))
        .mount(&server)
        .await;
    mount_page(&server, "/en/", "<p>Bread since 1952.</p>").await;

    let config = create_test_config(5);
    let result = crawl_site(&config, &seed(&server)).await.unwrap();

    assert_eq!(result.pages_crawled(), 2);
    assert!(result.has_english_version);
    assert_eq!(result.structured_data.len(), 1);
    assert_eq!(result.testimonials.len(), 1);

    let summary = result.summary(50);
    assert_eq!(summary.metadata.title.as_deref(), Some("Bäckerei Huber"));
    assert_eq!(summary.metadata.description.as_deref(), Some("Brot seit 1952"));
    assert!(summary.metadata.languages_detected.contains(&"de".to_string()));
    assert!(summary.social_proof.is_some());
}
