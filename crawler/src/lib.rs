pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod phases;
pub mod sitemap;
pub mod state;

pub use config::CrawlConfig;
pub use error::CrawlError;
pub use fetch::{FetchError, Fetcher};
pub use phases::{crawl, crawl_persons, crawl_publications, populate_details, CrawlSummary};
