//! Bounded, polite, concurrent single-domain web crawler.
//!
//! Given a seed URL, discovers and visits every reachable page on the same
//! host, honoring the host's robots.txt and a global request-rate cap, and
//! returns the set of visited URLs. The frontier guarantees each normalized
//! URL is scheduled at most once; workers drain it independently and the
//! crawl completes when all of them time out on an empty frontier.

pub mod crawler;
pub mod fetch;
pub mod frontier;
pub mod limiter;
pub mod normalize;
pub mod output;
pub mod robots;

pub use crawler::{CrawlEngine, MAX_WORKERS};
pub use fetch::{Fetcher, HttpFetcher, Page};

use std::time::Duration;

/// Identity string sent with every request, including robots.txt lookups.
pub const DEFAULT_USER_AGENT: &str = "sitecrawl/0.1 (+https://example.com/bot)";

/// Tuning knobs for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub user_agent: String,
    /// Worker pool size, clamped to 1..=MAX_WORKERS.
    pub workers: usize,
    /// Global steady-state request rate, requests/second.
    pub rate_per_sec: f64,
    /// Per-page fetch timeout.
    pub fetch_timeout: Duration,
    /// robots.txt fetch timeout.
    pub robots_timeout: Duration,
    /// How long a worker waits on an empty frontier before terminating.
    pub idle_timeout: Duration,
    /// Backstop for the whole run; on expiry workers are cancelled and the
    /// partial visited set is returned.
    pub crawl_timeout: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            workers: 4,
            rate_per_sec: 1.0,
            fetch_timeout: Duration::from_secs(10),
            robots_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(5),
            crawl_timeout: Duration::from_secs(600),
        }
    }
}
