use crate::fetch::FetchError;
use pubsearch_core::PersistError;
use thiserror::Error;

/// Errors that end a crawl. Per-page fetch failures never show up here; they become
/// placeholder records instead.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// A sitemap the crawl depends on is not listed where it should be.
    #[error("no sitemap entry matching {0:?}")]
    MissingSitemap(String),

    /// A robots or sitemap resource needed for discovery could not be fetched.
    #[error("discovery fetch failed: {0}")]
    Discovery(#[source] FetchError),

    #[error("malformed sitemap at {url}: {source}")]
    Sitemap {
        url: String,
        #[source]
        source: quick_xml::Error,
    },

    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("http client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("crawl task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
