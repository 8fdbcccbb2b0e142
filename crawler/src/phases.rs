use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::extract::{PageExtract, PersonPage, PublicationPage, RelatedPersons};
use crate::fetch::Fetcher;
use crate::sitemap::{find_entry, parse_robots, parse_sitemap, Robots};
use crate::state::{load_records, normalize_name, normalize_url, RecordStore, SeenSet};
use pubsearch_core::persist::{load_snapshot, save_snapshot};
use pubsearch_core::records::{PersonRecord, PublicationDetail, PublicationStub};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub new_persons: usize,
    pub new_publications: usize,
    pub populated_details: usize,
}

/// Runs the persons, publications and details phases in order.
pub async fn crawl(config: &CrawlConfig) -> Result<CrawlSummary, CrawlError> {
    std::fs::create_dir_all(&config.data_dir)?;
    let fetcher = Fetcher::new(config)?;
    let new_persons = crawl_persons(config, &fetcher).await?;
    let new_publications = crawl_publications(config, &fetcher).await?;
    let populated_details = populate_details(config, &fetcher).await?;
    let summary = CrawlSummary { new_persons, new_publications, populated_details };
    info!(new_persons, new_publications, populated_details, "incremental crawl finished");
    Ok(summary)
}

/// Robots file plus the sitemap-index entry matching `pattern`.
struct Discovery {
    robots: Robots,
    sitemap: String,
}

async fn discover(config: &CrawlConfig, fetcher: &Fetcher, pattern: &str) -> Result<Discovery, CrawlError> {
    let robots_txt = fetcher.fetch(config.robots_url.as_str()).await.map_err(CrawlError::Discovery)?;
    let robots = parse_robots(&robots_txt);
    let index_url = robots.sitemaps.first().cloned().ok_or_else(|| CrawlError::MissingSitemap("Sitemap:".into()))?;
    let index = fetch_sitemap(fetcher, &index_url).await?;
    let sitemap = find_entry(&index, pattern).ok_or_else(|| CrawlError::MissingSitemap(pattern.to_string()))?.to_string();
    debug!(%index_url, %sitemap, "sitemap resolved");
    Ok(Discovery { robots, sitemap })
}

async fn fetch_sitemap(fetcher: &Fetcher, url: &str) -> Result<Vec<String>, CrawlError> {
    let xml = fetcher.fetch(url).await.map_err(CrawlError::Discovery)?;
    parse_sitemap(xml.as_bytes()).map_err(|source| CrawlError::Sitemap { url: url.to_string(), source })
}

/// Normalized, robots-allowed urls not seen before; each is claimed in `seen` as it is kept.
/// Robots rules are case-sensitive, so they are matched against the url as the sitemap gave it.
fn unseen(urls: Vec<String>, robots: &Robots, seen: &SeenSet) -> Vec<String> {
    urls.iter()
        .filter(|raw| {
            let allowed = robots.allows(raw);
            if !allowed {
                debug!(url = %raw, "disallowed by robots.txt");
            }
            allowed
        })
        .map(|raw| normalize_url(raw))
        .filter(|u| seen.claim(u))
        .collect()
}

/// Visits every url concurrently (the fetcher's permits bound how many are in flight) and
/// appends each produced record the moment it is ready.
async fn fan_out<T, F, Fut>(urls: Vec<String>, store: Arc<RecordStore<T>>, visit: F) -> Result<usize, CrawlError>
where
    T: Serialize + serde::de::DeserializeOwned + Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let mut tasks = JoinSet::new();
    for url in urls {
        let record = visit(url);
        let store = store.clone();
        tasks.spawn(async move { store.append(&record.await) });
    }
    let mut appended = 0;
    while let Some(joined) = tasks.join_next().await {
        joined??;
        appended += 1;
    }
    Ok(appended)
}

/// Phase A: person pages from the persons sitemap.
pub async fn crawl_persons(config: &CrawlConfig, fetcher: &Fetcher) -> Result<usize, CrawlError> {
    let (store, existing) = RecordStore::<PersonRecord>::open(config.persons_path())?;
    let seen = SeenSet::from_records(&existing);

    let discovery = discover(config, fetcher, &config.persons_sitemap_pattern).await?;
    let person_urls = fetch_sitemap(fetcher, &discovery.sitemap).await?;
    let todo = unseen(person_urls, &discovery.robots, &seen);
    info!(known = existing.len(), new = todo.len(), "persons phase");

    let gate = fetcher.with_permits(config.person_concurrency);
    let config = Arc::new(config.clone());
    let appended = fan_out(todo, Arc::new(store), |url| {
        let (gate, config) = (gate.clone(), config.clone());
        async move {
            match gate.fetch(&url).await {
                Ok(html) => {
                    let page = PersonPage::from_html(&html, &config.base_url);
                    let interested = config.is_relevant_department(&page.department);
                    PersonRecord { url, name: page.name, department: page.department, interested }
                }
                Err(err) => {
                    warn!(%err, "person fetch failed, recording placeholder");
                    PersonRecord::placeholder(url)
                }
            }
        }
    })
    .await?;
    info!(appended, "new persons appended");
    Ok(appended)
}

fn interested_names(persons: &[PersonRecord]) -> HashSet<String> {
    persons.iter().filter(|p| p.interested).map(|p| normalize_name(&p.name)).filter(|n| !n.is_empty()).collect()
}

/// Phase B: publication stubs, interesting when an author is a known interesting person.
pub async fn crawl_publications(config: &CrawlConfig, fetcher: &Fetcher) -> Result<usize, CrawlError> {
    let (store, existing) = RecordStore::<PublicationStub>::open(config.publications_path())?;
    let seen = SeenSet::from_records(&existing);
    let people = Arc::new(interested_names(&load_records::<PersonRecord>(&config.persons_path())?));

    let discovery = discover(config, fetcher, &config.publications_sitemap_pattern).await?;
    let pages = std::iter::once(discovery.sitemap.clone())
        .chain((1..=config.publication_sitemap_pages).map(|n| format!("{}?n={n}", discovery.sitemap)));
    let mut pub_urls = Vec::new();
    for page in pages {
        match fetch_sitemap(fetcher, &page).await {
            Ok(urls) => pub_urls.extend(urls),
            Err(err) => warn!(%page, %err, "skipping publications sitemap page"),
        }
    }
    let todo = unseen(pub_urls, &discovery.robots, &seen);
    info!(known = existing.len(), new = todo.len(), interesting_people = people.len(), "publications phase");

    let gate = fetcher.with_permits(config.publication_concurrency);
    let base = Arc::new(config.base_url.clone());
    let appended = fan_out(todo, Arc::new(store), |url| {
        let (gate, base, people) = (gate.clone(), base.clone(), people.clone());
        async move {
            match gate.fetch(&url).await {
                Ok(html) => {
                    let authors = RelatedPersons::from_html(&html, &base);
                    let interested = authors.names().any(|n| people.contains(&normalize_name(n)));
                    PublicationStub { url, interested }
                }
                Err(err) => {
                    warn!(%err, "publication fetch failed, recording placeholder");
                    PublicationStub::placeholder(url)
                }
            }
        }
    })
    .await?;
    info!(appended, "new publications appended");
    Ok(appended)
}

fn to_detail(url: String, page: PublicationPage) -> PublicationDetail {
    let props = page.properties;
    PublicationDetail {
        url,
        title: page.title,
        abstract_text: page.abstract_text,
        authors: page.authors,
        citations: page.citations,
        journal: props.journal,
        volume: props.volume,
        pages: props.pages,
        article_number: props.article_number,
        doi: props.doi,
        publication_date: props.publication_date,
        early_online_date: props.early_online_date,
    }
}

/// Phase C: full details for interesting stubs missing from the snapshot. Failed fetches are
/// left out and picked up again by the next run.
pub async fn populate_details(config: &CrawlConfig, fetcher: &Fetcher) -> Result<usize, CrawlError> {
    let snapshot_path = config.snapshot_path();
    let mut snapshot = load_snapshot(&snapshot_path)?;
    let stubs: Vec<PublicationStub> = load_records(&config.publications_path())?;

    let mut missing = Vec::new();
    {
        let known = snapshot.urls();
        let mut queued = HashSet::new();
        for stub in stubs.into_iter().filter(|s| s.interested) {
            if !known.contains(stub.url.as_str()) && queued.insert(stub.url.clone()) {
                missing.push(stub.url);
            }
        }
    }
    info!(missing = missing.len(), "publications to populate");

    let gate = fetcher.with_permits(config.publication_concurrency);
    let base: Arc<Url> = Arc::new(config.base_url.clone());
    let mut tasks = JoinSet::new();
    for (order, url) in missing.into_iter().enumerate() {
        let (gate, base) = (gate.clone(), base.clone());
        tasks.spawn(async move {
            match gate.fetch(&url).await {
                Ok(html) => {
                    let detail = to_detail(url, PublicationPage::from_html(&html, &base));
                    debug!(title = detail.title.as_deref().unwrap_or(""), "details populated");
                    Some((order, detail))
                }
                Err(err) => {
                    warn!(%err, "detail fetch failed, will retry next run");
                    None
                }
            }
        });
    }
    let mut fetched = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        fetched.extend(joined?);
    }
    fetched.sort_by_key(|(order, _)| *order);

    let added = snapshot.merge(fetched.into_iter().map(|(_, detail)| detail));
    save_snapshot(&snapshot_path, &snapshot)?;
    info!(added, total = snapshot.len(), "detail snapshot written");
    Ok(added)
}
