//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small catalogue and run the full
//! crawl cycle end-to-end against it.

use shelf_sweep::config::Config;
use shelf_sweep::crawler::{run_crawl, Coordinator};
use shelf_sweep::output::load_items;
use shelf_sweep::CrawlError;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

struct Pod<'a> {
    slug: &'a str,
    title: &'a str,
    price: &'a str,
    rating: &'a str,
}

const CATEGORIES: &[(&str, &str)] = &[
    ("travel_2", "Travel"),
    ("mystery_3", "Mystery"),
    ("forbidden_9", "Forbidden"),
];

fn sidebar(categories: &[(&str, &str)]) -> String {
    let links: String = categories
        .iter()
        .map(|(slug, name)| {
            format!(
                r#"<li><a href="/catalogue/category/books/{}/index.html">{}</a></li>"#,
                slug, name
            )
        })
        .collect();
    format!(
        r#"<div class="side_categories"><ul class="nav nav-list"><li>
        <a href="/catalogue/category/books_1/index.html">Books</a><ul>{}</ul></li></ul></div>"#,
        links
    )
}

fn listing(active: &str, categories: &[(&str, &str)], pods: &[Pod], next: Option<&str>) -> String {
    let pods: String = pods
        .iter()
        .map(|pod| {
            format!(
                r#"<li class="col-xs-6 col-sm-4 col-md-3 col-lg-3"><article class="product_pod">
                <p class="star-rating {}"></p>
                <h3><a href="/catalogue/{}/index.html" title="{}">{}</a></h3>
                <div class="product_price"><p class="price_color">£{}</p>
                <p class="instock availability"><i class="icon-ok"></i> In stock </p></div>
                </article></li>"#,
                pod.rating, pod.slug, pod.title, pod.title, pod.price
            )
        })
        .collect();
    let pager = next
        .map(|href| format!(r#"<ul class="pager"><li class="next"><a href="{}">next</a></li></ul>"#, href))
        .unwrap_or_default();

    format!(
        r#"<html><body>
        <ul class="breadcrumb"><li><a href="/index.html">Home</a></li><li class="active">{}</li></ul>
        {}
        <ol class="row">{}</ol>
        {}
        </body></html>"#,
        active,
        sidebar(categories),
        pods,
        pager
    )
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Mounts the standard three-category catalogue
async fn mount_catalogue(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "User-agent: *\nDisallow: /catalogue/category/books/forbidden_9/\n",
        ))
        .mount(server)
        .await;

    mount_page(
        server,
        "/index.html",
        listing(
            "All products",
            CATEGORIES,
            &[Pod { slug: "mixed_99", title: "Mixed Bag", price: "9.99", rating: "Two" }],
            Some("/catalogue/page-2.html"),
        ),
    )
    .await;

    mount_page(
        server,
        "/catalogue/category/books/travel_2/index.html",
        listing(
            "Travel",
            CATEGORIES,
            &[
                Pod { slug: "its-only-the-himalayas_981", title: "It's Only the Himalayas", price: "45.17", rating: "Two" },
                Pod { slug: "full-moon-over-noahs-ark_811", title: "Full Moon over Noah's Ark", price: "49.43", rating: "Four" },
            ],
            Some("page-2.html"),
        ),
    )
    .await;

    mount_page(
        server,
        "/catalogue/category/books/travel_2/page-2.html",
        listing(
            "Travel",
            CATEGORIES,
            &[Pod { slug: "see-america_146", title: "See America", price: "48.87", rating: "Three" }],
            None,
        ),
    )
    .await;

    mount_page(
        server,
        "/catalogue/category/books/mystery_3/index.html",
        listing(
            "Mystery",
            CATEGORIES,
            &[Pod { slug: "sharp-objects_997", title: "Sharp Objects", price: "47.82", rating: "Nine" }],
            None,
        ),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/forbidden_9/index.html"))
        .respond_with(html(String::new()))
        .expect(0)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/catalogue/page-2.html"))
        .respond_with(html(String::new()))
        .expect(0)
        .mount(server)
        .await;
}

fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.start_url = format!("{}/index.html", server.uri());
    config.crawler.max_pages = 50;
    config.crawler.concurrency = 2;
    config.crawler.delay_ms = 0;
    config.fetch.base_backoff_ms = 10;
    config.fetch.max_backoff_ms = 50;
    config.fetch.request_timeout_secs = 5;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.primary_path = dir.join("data/items.jsonl").display().to_string();
    config.output.mirror_path = dir.join("web/data/items.jsonl").display().to_string();
    config
}

fn page_requests(requests: &[wiremock::Request]) -> usize {
    requests
        .iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .count()
}

#[tokio::test]
async fn test_category_first_crawl() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    let summary = run_crawl(config.clone()).await.unwrap();

    assert_eq!(summary.pages_fetched, 4);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(summary.pages_failed, 0);
    assert_eq!(summary.items_written, 4);
    assert_eq!(summary.duplicates, 0);

    let loaded = load_items(Path::new(&config.output.primary_path)).unwrap();
    assert_eq!(loaded.items.len(), 4);
    assert_eq!(loaded.skipped_lines, 0);
    assert!(loaded.items.iter().all(|item| item.title != "Mixed Bag"));

    let himalayas = loaded
        .items
        .iter()
        .find(|item| item.title == "It's Only the Himalayas")
        .unwrap();
    assert_eq!(
        himalayas.url,
        format!("{}/catalogue/its-only-the-himalayas_981/index.html", server.uri())
    );
    assert!((himalayas.price - 45.17).abs() < 1e-9);
    assert_eq!(himalayas.rating, 2);
    assert_eq!(himalayas.category, "Travel");
    assert_eq!(himalayas.availability, "In stock");
    assert_eq!(himalayas.schema_version, 1);

    let sharp = loaded
        .items
        .iter()
        .find(|item| item.title == "Sharp Objects")
        .unwrap();
    assert_eq!(sharp.category, "Mystery");
    assert_eq!(sharp.rating, 0);

    let primary = fs::read_to_string(&config.output.primary_path).unwrap();
    let mirror = fs::read_to_string(&config.output.mirror_path).unwrap();
    let mut primary_lines: Vec<&str> = primary.lines().collect();
    let mut mirror_lines: Vec<&str> = mirror.lines().collect();
    primary_lines.sort();
    mirror_lines.sort();
    assert_eq!(primary_lines, mirror_lines);
}

#[tokio::test]
async fn test_category_seed_is_crawled_to_exhaustion() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.crawler.start_url = format!(
        "{}/catalogue/category/books/travel_2/index.html",
        server.uri()
    );

    let summary = run_crawl(config.clone()).await.unwrap();

    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.pages_skipped, 1);
    assert_eq!(summary.items_written, 4);

    let loaded = load_items(Path::new(&config.output.primary_path)).unwrap();
    let mut travel: Vec<&str> = loaded
        .items
        .iter()
        .filter(|item| item.category == "Travel")
        .map(|item| item.title.as_str())
        .collect();
    travel.sort();
    assert_eq!(
        travel,
        vec!["Full Moon over Noah's Ark", "It's Only the Himalayas", "See America"]
    );
    assert!(loaded.items.iter().any(|item| item.title == "Sharp Objects"));

    let requests = server.received_requests().await.unwrap();
    let seed_fetches = requests
        .iter()
        .filter(|r| r.url.path() == "/catalogue/category/books/travel_2/index.html")
        .count();
    assert_eq!(seed_fetches, 1);
    assert!(requests
        .iter()
        .any(|r| r.url.path() == "/catalogue/category/books/travel_2/page-2.html"));
}

#[tokio::test]
async fn test_resume_is_idempotent() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, dir.path());

    run_crawl(config.clone()).await.unwrap();
    let first = fs::read_to_string(&config.output.primary_path).unwrap();

    let summary = run_crawl(config.clone()).await.unwrap();
    let second = fs::read_to_string(&config.output.primary_path).unwrap();

    assert_eq!(first, second);
    assert_eq!(summary.items_written, 0);
    assert_eq!(summary.duplicates, 4);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let server = MockServer::start().await;
    mount_catalogue(&server).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.crawler.dry_run = true;

    let summary = run_crawl(config.clone()).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.items_written, 4);
    assert!(!Path::new(&config.output.primary_path).exists());
    assert!(!dir.path().join("web").exists());
}

#[tokio::test]
async fn test_max_pages_bound() {
    let server = MockServer::start().await;
    let categories: Vec<(String, String)> = (0..50)
        .map(|i| (format!("shelf_{}", i), format!("Shelf {}", i)))
        .collect();
    let category_refs: Vec<(&str, &str)> = categories
        .iter()
        .map(|(slug, name)| (slug.as_str(), name.as_str()))
        .collect();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(&server, "/index.html", listing("All products", &category_refs, &[], None)).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/catalogue/category/books/shelf_\d+/index\.html$"))
        .respond_with(html(listing(
            "Shelf",
            &category_refs,
            &[Pod { slug: "book_1", title: "Book", price: "1.00", rating: "One" }],
            None,
        )))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.crawler.max_pages = 5;
    config.crawler.concurrency = 4;

    let summary = run_crawl(config).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(page_requests(&requests) <= 5);
    assert!(summary.pages_fetched <= 5);
    assert_eq!(summary.items_written, 1);
}

#[tokio::test]
async fn test_retry_ceiling_on_persistent_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/index.html",
        listing("All products", &[("broken_1", "Broken")], &[], None),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/category/books/broken_1/index.html"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let summary = run_crawl(test_config(&server, dir.path())).await.unwrap();

    assert_eq!(summary.pages_fetched, 1);
    assert_eq!(summary.pages_failed, 1);
    assert_eq!(summary.items_written, 0);
}

#[tokio::test]
async fn test_follow_items_records_detail_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/index.html",
        listing("All products", &[("poetry_23", "Poetry")], &[], None),
    )
    .await;
    mount_page(
        &server,
        "/catalogue/category/books/poetry_23/index.html",
        listing(
            "Poetry",
            &[("poetry_23", "Poetry")],
            &[Pod { slug: "a-light-in-the-attic_1000", title: "A Light in the Attic", price: "51.77", rating: "Three" }],
            None,
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/catalogue/a-light-in-the-attic_1000/index.html"))
        .respond_with(html(
            r#"<html><body>
            <ul class="breadcrumb">
                <li><a href="/index.html">Home</a></li>
                <li><a href="/catalogue/category/books_1/index.html">Books</a></li>
                <li><a href="/catalogue/category/books/poetry_23/index.html">Poetry</a></li>
                <li class="active">A Light in the Attic</li>
            </ul>
            <div class="col-sm-6 product_main">
                <h1>A Light in the Attic</h1>
                <p class="price_color">£51.77</p>
                <p class="instock availability"><i class="icon-ok"></i> In stock (22 available) </p>
                <p class="star-rating Three"></p>
            </div>
            </body></html>"#
                .to_string(),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.crawler.follow_item_pages = true;

    let summary = run_crawl(config.clone()).await.unwrap();
    assert_eq!(summary.pages_fetched, 3);
    assert_eq!(summary.items_written, 1);

    let loaded = load_items(Path::new(&config.output.primary_path)).unwrap();
    assert_eq!(loaded.items.len(), 1);
    let item = &loaded.items[0];
    assert_eq!(item.category, "Poetry");
    assert_eq!(item.rating, 3);
    assert_eq!(item.availability, "In stock (22 available)");
}

/// Serves a fixed page and notes when each request arrived
struct Timed {
    body: String,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for Timed {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        html(self.body.clone())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_robots_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    let shelves: &[(&str, &str)] = &[("slow_1", "Slow"), ("slower_2", "Slower")];
    let arrivals = Arc::new(Mutex::new(Vec::new()));

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 0.2\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(Timed {
            body: listing("All products", shelves, &[], None),
            arrivals: arrivals.clone(),
        })
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/catalogue/category/books/[a-z]+_\d+/index\.html$"))
        .respond_with(Timed {
            body: listing(
                "Slow",
                shelves,
                &[Pod { slug: "tortoise_7", title: "Tortoise", price: "3.00", rating: "One" }],
                None,
            ),
            arrivals: arrivals.clone(),
        })
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, dir.path());
    config.crawler.delay_ms = 0;
    config.crawler.concurrency = 2;

    let summary = run_crawl(config).await.unwrap();
    assert_eq!(summary.pages_fetched, 3);

    let mut arrivals = arrivals.lock().unwrap().clone();
    arrivals.sort();
    assert_eq!(arrivals.len(), 3);
    for pair in arrivals.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(180), "requests only {:?} apart", gap);
    }
}

#[tokio::test]
async fn test_unreachable_start_host_is_fatal() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.crawler.start_url = format!("http://127.0.0.1:{}/index.html", port);
    config.crawler.delay_ms = 0;
    config.fetch.max_attempts = 2;
    config.fetch.base_backoff_ms = 10;
    config.fetch.max_backoff_ms = 20;
    config.output.primary_path = dir.path().join("items.jsonl").display().to_string();
    config.output.mirror_path = dir.path().join("mirror.jsonl").display().to_string();

    let result = Coordinator::new(config).await;
    assert!(matches!(result, Err(CrawlError::RobotsUnreachable { .. })));
}
