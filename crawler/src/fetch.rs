use crate::config::CrawlConfig;
use rand::Rng;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::sleep;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch gate closed")]
    Closed,
}

/// The one fetch primitive every phase uses: a shared HTTP client, a counting permit gate and
/// a uniform random delay before each request.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    min_delay: Duration,
    max_delay: Duration,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new(config: &CrawlConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, min_delay: config.min_delay, max_delay: config.max_delay, permits: Arc::new(Semaphore::new(1)) })
    }

    /// Same client and delays behind a fresh gate of `permits` concurrent fetches.
    pub fn with_permits(&self, permits: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(permits.max(1))), ..self.clone() }
    }

    fn jitter(&self) -> Duration {
        let (lo, hi) = (self.min_delay.as_millis() as u64, self.max_delay.as_millis() as u64);
        if hi <= lo {
            return Duration::from_millis(lo);
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    /// GET `url` and return the body of a 2xx response.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let _permit = self.permits.acquire().await.map_err(|_| FetchError::Closed)?;
        sleep(self.jitter()).await;

        let transport = |source: reqwest::Error| FetchError::Transport { url: url.to_string(), source };
        let resp = self.client.get(url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }
        resp.text().await.map_err(transport)
    }
}
