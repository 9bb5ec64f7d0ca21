use crate::fetch::{extract_links, is_html_like, Fetcher};
use crate::frontier::Frontier;
use crate::limiter::RateLimiter;
use crate::normalize::normalize;
use crate::robots::PolicyGate;
use crate::CrawlConfig;
use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

/// Upper bound on the worker pool size.
pub const MAX_WORKERS: usize = 20;

struct CrawlShared {
    frontier: Frontier,
    gate: PolicyGate,
    limiter: RateLimiter,
    fetcher: Arc<dyn Fetcher>,
    root_domain: String,
    idle_timeout: Duration,
}

/// Owns the frontier, policy gate and rate limiter for one crawl run and
/// drives the worker pool to completion.
pub struct CrawlEngine {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
}

impl CrawlEngine {
    pub fn new(config: CrawlConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Crawl every reachable page on the seed's host and return the set of
    /// discovered normalized URLs. Fails only when the seed itself is
    /// invalid; page-level failures are logged and skipped. The pool drains
    /// naturally once every worker observes an empty frontier for the idle
    /// window; the overall timeout is a backstop against stalls, after which
    /// the partial set is still returned.
    pub async fn run(&self, seed: &str) -> Result<HashSet<String>> {
        let seed_url = Url::parse(seed).with_context(|| format!("invalid seed url: {seed}"))?;
        let root_domain = seed_url
            .host_str()
            .ok_or_else(|| anyhow!("seed url has no host: {seed}"))?
            .to_lowercase();
        let seed_normalized =
            normalize(seed).ok_or_else(|| anyhow!("seed url does not normalize: {seed}"))?;

        let shared = Arc::new(CrawlShared {
            frontier: Frontier::new(),
            gate: PolicyGate::new(Arc::clone(&self.fetcher), self.config.user_agent.clone()),
            limiter: RateLimiter::new(self.config.rate_per_sec),
            fetcher: Arc::clone(&self.fetcher),
            root_domain,
            idle_timeout: self.config.idle_timeout,
        });
        shared.frontier.seed(seed_normalized);

        let workers = self.config.workers.clamp(1, MAX_WORKERS);
        info!(
            workers,
            rate = self.config.rate_per_sec,
            domain = %shared.root_domain,
            "starting crawl"
        );

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let shared = Arc::clone(&shared);
            handles.push(tokio::spawn(worker(shared, id)));
        }
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let join_all = async move {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if timeout(self.config.crawl_timeout, join_all).await.is_err() {
            warn!("crawl timeout exceeded, cancelling remaining workers");
            for abort in aborts {
                abort.abort();
            }
        }

        let visited = shared.frontier.snapshot_visited();
        info!(visited = visited.len(), "crawl finished");
        Ok(visited)
    }
}

async fn worker(shared: Arc<CrawlShared>, id: usize) {
    debug!(worker = id, "worker started");
    while let Some(url) = shared.frontier.take(shared.idle_timeout).await {
        process_url(&shared, &url).await;
    }
    debug!(worker = id, "worker idle, terminating");
}

/// One frontier entry, end to end. Every failure here is final for this URL
/// and fatal for nothing else.
async fn process_url(shared: &CrawlShared, url_str: &str) {
    info!(url = url_str, "crawling");
    let Ok(url) = Url::parse(url_str) else {
        // Frontier entries are normalized, so this should be unreachable.
        warn!(url = url_str, "unparsable frontier entry");
        return;
    };

    if !shared.gate.is_allowed(&url).await {
        warn!(%url, "disallowed by robots.txt");
        return;
    }

    shared.limiter.acquire().await;

    let page = match shared.fetcher.fetch_page(&url).await {
        Ok(page) => page,
        Err(e) => {
            warn!(%url, error = %e, "fetch failed");
            return;
        }
    };
    if !is_html_like(page.content_type.as_deref()) {
        debug!(%url, content_type = ?page.content_type, "skipping non-html content");
        return;
    }

    for link in extract_links(&page.body, &url) {
        let Some(host) = link.host_str() else {
            continue;
        };
        if !host.eq_ignore_ascii_case(&shared.root_domain) {
            continue;
        }
        let Some(normalized) = normalize(link.as_str()) else {
            continue;
        };
        shared.frontier.try_enqueue(normalized);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Page;
    use async_trait::async_trait;

    struct NoFetcher;

    #[async_trait]
    impl Fetcher for NoFetcher {
        async fn fetch_page(&self, _url: &Url) -> Result<Page> {
            Err(anyhow!("unreachable"))
        }
        async fn fetch_robots(&self, _url: &Url) -> Result<String> {
            Err(anyhow!("unreachable"))
        }
    }

    #[tokio::test]
    async fn invalid_seed_fails_before_workers_start() {
        let engine = CrawlEngine::new(CrawlConfig::default(), Arc::new(NoFetcher));
        let err = engine.run("definitely not a url").await.unwrap_err();
        assert!(err.to_string().contains("invalid seed url"));
    }

    #[tokio::test]
    async fn hostless_seed_is_rejected() {
        let engine = CrawlEngine::new(CrawlConfig::default(), Arc::new(NoFetcher));
        let err = engine.run("data:text/plain,hello").await.unwrap_err();
        assert!(err.to_string().contains("no host"));
    }
}
