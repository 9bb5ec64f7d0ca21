use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use scraper::{Html, Selector};
use std::time::Duration;
use url::Url;

/// A fetched document: raw body plus the declared content type, if any.
pub struct Page {
    pub body: String,
    pub content_type: Option<String>,
}

/// The HTTP collaborator the crawl core talks to. Kept behind a trait so
/// crawl semantics can be exercised against an in-memory implementation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a page. Timeouts, connection failures and non-2xx statuses all
    /// surface as errors; the caller treats every error the same way (skip
    /// the URL).
    async fn fetch_page(&self, url: &Url) -> Result<Page>;

    /// Fetch a robots.txt document as text. Errors mean "no policy
    /// document"; the policy gate resolves that to allow-all.
    async fn fetch_robots(&self, url: &Url) -> Result<String>;
}

/// reqwest-backed fetcher carrying the crawler's identity string.
pub struct HttpFetcher {
    client: Client,
    fetch_timeout: Duration,
    robots_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        fetch_timeout: Duration,
        robots_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            fetch_timeout,
            robots_timeout,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<Page> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("HTTP {} for {}", resp.status(), url));
        }
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.text().await?;
        Ok(Page { body, content_type })
    }

    async fn fetch_robots(&self, url: &Url) -> Result<String> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.robots_timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("HTTP {} for {}", resp.status(), url));
        }
        Ok(resp.text().await?)
    }
}

/// True when the declared content type is worth parsing for links.
pub fn is_html_like(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => ct.starts_with("text/html") || ct.contains("xml"),
        None => false,
    }
}

/// Every absolute http(s) link target in the document, relative hrefs
/// resolved against `base`. Document order, may be empty. Kept synchronous:
/// `scraper::Html` is not `Send`, so it must not live across an await point
/// in the worker.
pub fn extract_links(body: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(body);
    let selector = Selector::parse("a[href]").expect("static selector");
    let mut links = Vec::new();
    for element in doc.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.is_empty() {
            continue;
        }
        if let Ok(url) = Url::parse(href).or_else(|_| base.join(href)) {
            if url.scheme() == "http" || url.scheme() == "https" {
                links.push(url);
            }
        }
    }
    links
}
