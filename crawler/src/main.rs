use anyhow::{Context, Result};
use clap::Parser;
use crawler::config::{parse_keywords, DEFAULT_BASE_URL, DEFAULT_KEYWORDS, DEFAULT_USER_AGENT};
use crawler::{crawl, CrawlConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Incrementally crawl a research portal's persons and publications via its sitemaps")]
struct Cli {
    /// Root of the portal
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,
    /// robots.txt location (defaults to <base-url>/robots.txt)
    #[arg(long, env = "ROBOTS_URL")]
    robots_url: Option<String>,
    /// Directory holding persons.jsonl, publications.jsonl and data.json
    #[arg(long, env = "DATA_PATH", default_value = "data")]
    data_dir: PathBuf,
    /// Comma separated department keywords marking a person as relevant
    #[arg(long, env = "DEPARTMENT_KEYWORDS", default_value = DEFAULT_KEYWORDS)]
    keywords: String,
    /// Minimum politeness delay before each request (ms)
    #[arg(long, env = "MIN_DELAY_MS", default_value_t = 200)]
    min_delay_ms: u64,
    /// Maximum politeness delay before each request (ms)
    #[arg(long, env = "MAX_DELAY_MS", default_value_t = 700)]
    max_delay_ms: u64,
    /// Concurrent person page fetches
    #[arg(long, env = "PERSON_CONCURRENCY", default_value_t = 6)]
    person_concurrency: usize,
    /// Concurrent publication page fetches
    #[arg(long, env = "PUB_CONCURRENCY", default_value_t = 16)]
    pub_concurrency: usize,
    /// Request timeout seconds
    #[arg(long, env = "TIMEOUT_SECS", default_value_t = 60)]
    timeout_secs: u64,
    /// Number of `?n=` pages of the publications sitemap after the first
    #[arg(long, env = "PUB_SITEMAP_PAGES", default_value_t = 16)]
    pub_sitemap_pages: u32,
    /// User-Agent string sent with every request
    #[arg(long, env = "USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

impl Cli {
    fn into_config(self) -> Result<CrawlConfig> {
        let base_url = Url::parse(&self.base_url).with_context(|| format!("invalid base url {}", self.base_url))?;
        let mut config = CrawlConfig::new(base_url)?;
        if let Some(robots) = self.robots_url {
            config.robots_url = Url::parse(&robots).with_context(|| format!("invalid robots url {robots}"))?;
        }
        config.data_dir = self.data_dir;
        config.keywords = parse_keywords(&self.keywords);
        config.min_delay = Duration::from_millis(self.min_delay_ms);
        config.max_delay = Duration::from_millis(self.max_delay_ms.max(self.min_delay_ms));
        config.person_concurrency = self.person_concurrency;
        config.publication_concurrency = self.pub_concurrency;
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.publication_sitemap_pages = self.pub_sitemap_pages;
        config.user_agent = self.user_agent;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();
    let config = Cli::parse().into_config()?;
    tracing::info!(
        base_url = %config.base_url,
        data_dir = %config.data_dir.display(),
        person_concurrency = config.person_concurrency,
        publication_concurrency = config.publication_concurrency,
        "crawler starting"
    );

    let summary = crawl(&config).await.context("crawl failed")?;
    tracing::info!(
        new_persons = summary.new_persons,
        new_publications = summary.new_publications,
        populated_details = summary.populated_details,
        snapshot = %config.snapshot_path().display(),
        "done"
    );
    Ok(())
}
