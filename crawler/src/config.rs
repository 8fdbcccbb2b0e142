use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://pureportal.coventry.ac.uk";
pub const DEFAULT_USER_AGENT: &str = "IncrementalPureCrawler/5.0";
pub const DEFAULT_KEYWORDS: &str = "computational science,mathematical modelling";

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub base_url: Url,
    pub robots_url: Url,
    pub data_dir: PathBuf,
    pub persons_file: String,
    pub publications_file: String,
    pub snapshot_file: String,
    /// Lowercased department keywords that mark a person as interesting.
    pub keywords: Vec<String>,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub person_concurrency: usize,
    pub publication_concurrency: usize,
    pub timeout: Duration,
    pub user_agent: String,
    pub persons_sitemap_pattern: String,
    pub publications_sitemap_pattern: String,
    /// Extra `?n=` pages of the publications sitemap after the base page.
    pub publication_sitemap_pages: u32,
}

impl CrawlConfig {
    /// Defaults for a site rooted at `base_url`, robots file at `/robots.txt`.
    pub fn new(base_url: Url) -> Result<Self, url::ParseError> {
        let robots_url = base_url.join("/robots.txt")?;
        Ok(Self {
            base_url,
            robots_url,
            data_dir: PathBuf::from("data"),
            persons_file: "persons.jsonl".into(),
            publications_file: "publications.jsonl".into(),
            snapshot_file: "data.json".into(),
            keywords: parse_keywords(DEFAULT_KEYWORDS),
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(700),
            person_concurrency: 6,
            publication_concurrency: 16,
            timeout: Duration::from_secs(60),
            user_agent: DEFAULT_USER_AGENT.into(),
            persons_sitemap_pattern: "persons.xml".into(),
            publications_sitemap_pattern: "publications.xml".into(),
            publication_sitemap_pages: 16,
        })
    }

    pub fn persons_path(&self) -> PathBuf { self.data_dir.join(&self.persons_file) }
    pub fn publications_path(&self) -> PathBuf { self.data_dir.join(&self.publications_file) }
    pub fn snapshot_path(&self) -> PathBuf { self.data_dir.join(&self.snapshot_file) }

    pub fn is_relevant_department(&self, department: &str) -> bool {
        let department = department.to_lowercase();
        self.keywords.iter().any(|k| department.contains(k.as_str()))
    }
}

/// Comma separated keywords, trimmed and lowercased; blanks dropped.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',').map(|k| k.trim().to_lowercase()).filter(|k| !k.is_empty()).collect()
}
