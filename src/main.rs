use anyhow::{anyhow, Result};
use clap::Parser;
use sitecrawl::{output, CrawlConfig, CrawlEngine, HttpFetcher, DEFAULT_USER_AGENT, MAX_WORKERS};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser)]
#[command(name = "sitecrawl")]
#[command(about = "Crawl one domain politely and record every visited URL")]
struct Args {
    /// Seed URL to start from; the crawl stays on its host
    seed: String,
    /// Number of crawl workers (1-20)
    #[arg(long, default_value_t = 4)]
    workers: usize,
    /// Global request rate, requests per second
    #[arg(long, default_value_t = 1.0)]
    rate: f64,
    /// Per-page fetch timeout in seconds
    #[arg(long, default_value_t = 10)]
    fetch_timeout: u64,
    /// robots.txt fetch timeout in seconds
    #[arg(long, default_value_t = 5)]
    robots_timeout: u64,
    /// Seconds a worker waits on an empty frontier before exiting
    #[arg(long, default_value_t = 5)]
    idle_timeout: u64,
    /// Overall crawl timeout in seconds
    #[arg(long, default_value_t = 600)]
    crawl_timeout: u64,
    /// Directory the visited-URL listing is written to
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
    /// User-Agent string to identify as
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    if args.workers < 1 || args.workers > MAX_WORKERS {
        return Err(anyhow!("workers must be between 1 and {MAX_WORKERS}"));
    }
    if args.rate <= 0.0 {
        return Err(anyhow!("rate must be positive"));
    }
    let root_domain = Url::parse(&args.seed)
        .map_err(|e| anyhow!("invalid seed url '{}': {e}", args.seed))?
        .host_str()
        .ok_or_else(|| anyhow!("seed url has no host: {}", args.seed))?
        .to_lowercase();

    let config = CrawlConfig {
        user_agent: args.user_agent,
        workers: args.workers,
        rate_per_sec: args.rate,
        fetch_timeout: Duration::from_secs(args.fetch_timeout),
        robots_timeout: Duration::from_secs(args.robots_timeout),
        idle_timeout: Duration::from_secs(args.idle_timeout),
        crawl_timeout: Duration::from_secs(args.crawl_timeout),
    };
    let fetcher = Arc::new(HttpFetcher::new(
        &config.user_agent,
        config.fetch_timeout,
        config.robots_timeout,
    )?);
    let engine = CrawlEngine::new(config, fetcher);

    let started = Instant::now();
    let visited = engine.run(&args.seed).await?;
    let elapsed = started.elapsed();
    tracing::info!(
        visited = visited.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        "crawl complete"
    );

    let path = args.output_dir.join(output::output_filename(&root_domain));
    output::save_visited(&path, &visited)?;
    tracing::info!(path = %path.display(), "saved visited urls");
    Ok(())
}
