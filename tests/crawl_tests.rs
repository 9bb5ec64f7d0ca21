//! End-to-end crawl scenarios over an in-memory site.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use sitecrawl::{CrawlConfig, CrawlEngine, Fetcher, Page};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Serves a fixed set of pages and records every page fetch.
struct MockSite {
    pages: HashMap<String, (String, String)>, // url -> (content type, body)
    robots: HashMap<String, String>,          // robots.txt url -> body
    failing: HashSet<String>,
    fetch_log: Mutex<Vec<String>>,
}

impl MockSite {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            robots: HashMap::new(),
            failing: HashSet::new(),
            fetch_log: Mutex::new(Vec::new()),
        }
    }

    fn html(mut self, url: &str, links: &[&str]) -> Self {
        let body = links
            .iter()
            .map(|l| format!("<a href=\"{l}\">link</a>"))
            .collect::<String>();
        self.pages.insert(
            url.to_string(),
            ("text/html; charset=utf-8".to_string(), body),
        );
        self
    }

    fn raw(mut self, url: &str, content_type: &str, body: &str) -> Self {
        self.pages
            .insert(url.to_string(), (content_type.to_string(), body.to_string()));
        self
    }

    fn robots(mut self, robots_url: &str, body: &str) -> Self {
        self.robots.insert(robots_url.to_string(), body.to_string());
        self
    }

    fn fail(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().clone()
    }
}

#[async_trait]
impl Fetcher for MockSite {
    async fn fetch_page(&self, url: &Url) -> Result<Page> {
        self.fetch_log.lock().push(url.to_string());
        if self.failing.contains(url.as_str()) {
            return Err(anyhow!("simulated timeout for {url}"));
        }
        match self.pages.get(url.as_str()) {
            Some((content_type, body)) => Ok(Page {
                body: body.clone(),
                content_type: Some(content_type.clone()),
            }),
            None => Err(anyhow!("404 for {url}")),
        }
    }

    async fn fetch_robots(&self, url: &Url) -> Result<String> {
        self.robots
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| anyhow!("no robots.txt at {url}"))
    }
}

fn test_config() -> CrawlConfig {
    CrawlConfig {
        workers: 4,
        rate_per_sec: 10_000.0,
        idle_timeout: Duration::from_millis(200),
        crawl_timeout: Duration::from_secs(30),
        ..CrawlConfig::default()
    }
}

async fn run_crawl(site: Arc<MockSite>, seed: &str) -> HashSet<String> {
    let engine = CrawlEngine::new(test_config(), site);
    engine.run(seed).await.expect("crawl runs")
}

fn set(urls: &[&str]) -> HashSet<String> {
    urls.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fragment_and_slash_variants_collapse_into_one_page() {
    let site = Arc::new(
        MockSite::new()
            .html("https://x.test/a", &["/a#frag", "/a/", "/b"])
            .html("https://x.test/b", &[]),
    );
    let visited = run_crawl(Arc::clone(&site), "https://x.test/a").await;
    assert_eq!(visited, set(&["https://x.test/a", "https://x.test/b"]));

    let fetched = site.fetched();
    assert_eq!(
        fetched.iter().filter(|u| u.as_str() == "https://x.test/a").count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn foreign_hosts_are_never_visited_or_fetched() {
    let site = Arc::new(
        MockSite::new()
            .html("https://x.test/c", &["https://other.test/d", "/e"])
            .html("https://x.test/e", &[]),
    );
    let visited = run_crawl(Arc::clone(&site), "https://x.test/c").await;
    assert_eq!(visited, set(&["https://x.test/c", "https://x.test/e"]));
    assert!(site
        .fetched()
        .iter()
        .all(|u| !u.contains("other.test")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn www_subdomain_counts_as_a_different_host() {
    // Domain scoping compares hosts verbatim, so www links fall outside a
    // bare-apex crawl even though robots lookups collapse the two.
    let site = Arc::new(
        MockSite::new().html("https://x.test/a", &["https://www.x.test/b"]),
    );
    let visited = run_crawl(Arc::clone(&site), "https://x.test/a").await;
    assert_eq!(visited, set(&["https://x.test/a"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disallowed_path_is_recorded_but_never_fetched() {
    let site = Arc::new(
        MockSite::new()
            .robots(
                "https://x.test/robots.txt",
                "User-agent: *\nDisallow: /private\n",
            )
            .html("https://x.test/a", &["/private", "/b"])
            .html("https://x.test/b", &[])
            .html("https://x.test/private", &["/hidden"]),
    );
    let visited = run_crawl(Arc::clone(&site), "https://x.test/a").await;

    // Discovery records /private as seen; the gate stops the fetch, so
    // nothing it links to is ever discovered.
    assert_eq!(
        visited,
        set(&[
            "https://x.test/a",
            "https://x.test/b",
            "https://x.test/private",
        ])
    );
    let fetched = site.fetched();
    assert!(!fetched.contains(&"https://x.test/private".to_string()));
    assert!(!visited.contains("https://x.test/hidden"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fetch_failure_is_contained_to_that_url() {
    let site = Arc::new(
        MockSite::new()
            .html("https://x.test/a", &["/b", "/c"])
            .fail("https://x.test/b")
            .html("https://x.test/c", &["/d"])
            .html("https://x.test/d", &[]),
    );
    let visited = run_crawl(Arc::clone(&site), "https://x.test/a").await;
    // /b stays in the visited set (dedup happens at enqueue, before fetch)
    // but contributes no links.
    assert_eq!(
        visited,
        set(&[
            "https://x.test/a",
            "https://x.test/b",
            "https://x.test/c",
            "https://x.test/d",
        ])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn non_html_content_is_not_parsed_for_links() {
    let site = Arc::new(
        MockSite::new()
            .html("https://x.test/a", &["/report.pdf"])
            .raw(
                "https://x.test/report.pdf",
                "application/pdf",
                "<a href=\"/never\">not really html</a>",
            ),
    );
    let visited = run_crawl(Arc::clone(&site), "https://x.test/a").await;
    assert_eq!(
        visited,
        set(&["https://x.test/a", "https://x.test/report.pdf"])
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cyclic_graph_terminates_with_full_reachable_set() {
    let site = Arc::new(
        MockSite::new()
            .html("https://x.test/a", &["/b", "/c"])
            .html("https://x.test/b", &["/a", "/c", "/b"])
            .html("https://x.test/c", &["/a", "/d"])
            .html("https://x.test/d", &["/a#top", "/d/"]),
    );
    let visited = run_crawl(Arc::clone(&site), "https://x.test/a").await;
    assert_eq!(
        visited,
        set(&[
            "https://x.test/a",
            "https://x.test/b",
            "https://x.test/c",
            "https://x.test/d",
        ])
    );

    // At most one fetch per normalized URL, cycles notwithstanding.
    let fetched = site.fetched();
    let unique: HashSet<&String> = fetched.iter().collect();
    assert_eq!(fetched.len(), unique.len(), "duplicate fetch in {fetched:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_crawl_also_completes() {
    let site = Arc::new(
        MockSite::new()
            .html("https://x.test/a", &["/b"])
            .html("https://x.test/b", &["/c"])
            .html("https://x.test/c", &[]),
    );
    let engine = CrawlEngine::new(
        CrawlConfig {
            workers: 1,
            ..test_config()
        },
        Arc::clone(&site) as Arc<dyn Fetcher>,
    );
    let visited = engine.run("https://x.test/a").await.unwrap();
    assert_eq!(visited.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overall_timeout_returns_partial_set() {
    // Every fetch hangs longer than the crawl timeout, so the backstop
    // cancels the workers; the seed is still reported.
    struct StallingFetcher;

    #[async_trait]
    impl Fetcher for StallingFetcher {
        async fn fetch_page(&self, _url: &Url) -> Result<Page> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(anyhow!("unreachable"))
        }
        async fn fetch_robots(&self, _url: &Url) -> Result<String> {
            Err(anyhow!("none"))
        }
    }

    let engine = CrawlEngine::new(
        CrawlConfig {
            workers: 2,
            crawl_timeout: Duration::from_millis(300),
            idle_timeout: Duration::from_secs(10),
            ..test_config()
        },
        Arc::new(StallingFetcher),
    );
    let visited = engine.run("https://x.test/a").await.unwrap();
    assert_eq!(visited, set(&["https://x.test/a"]));
}
