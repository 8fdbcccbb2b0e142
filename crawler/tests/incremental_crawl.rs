use crawler::state::load_records;
use crawler::{crawl, crawl_persons, CrawlConfig, CrawlError, Fetcher};
use pubsearch_core::persist::load_snapshot;
use pubsearch_core::records::{PersonRecord, PublicationStub};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urlset(locs: &[String]) -> String {
    let urls: String = locs.iter().map(|l| format!("<url><loc>{l}</loc></url>")).collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#)
}

fn sitemap_index(locs: &[String]) -> String {
    let maps: String = locs.iter().map(|l| format!("<sitemap><loc>{l}</loc></sitemap>")).collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{maps}</sitemapindex>"#)
}

fn person_page(name: &str, department: &str) -> String {
    format!(r#"<html><body><h1>{name}</h1><a rel="Organisation" href="/en/organisations/x">{department}</a></body></html>"#)
}

const PINNS: &str = r#"<html><body>
<h1>Physics-informed neural networks for flow</h1>
<p class="relations persons"><a href="/en/persons/alice-smith">Alice Smith</a>, R. Roe</p>
<div class="rendering rendering_abstractportal"><div class="textblock">Surrogates for fluid flow.</div></div>
<div class="metric scopus-citations"><span class="count">5</span></div>
<table class="properties">
<tr><th>Journal</th><td>Computers &amp; Fluids</td></tr>
<tr><th>Publication status</th><td>Published - 2 May 2022</td></tr>
</table>
</body></html>"#;

const CONTRACTS: &str = r#"<html><body><h1>Contract law today</h1>
<p class="relations persons">Bob Jones</p></body></html>"#;

async fn get(server: &MockServer, route: &str, status: u16, body: impl Into<String>, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body.into()))
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_discovery(server: &MockServer, with_persons: bool) {
    let uri = server.uri();
    let robots = format!("User-agent: *\nDisallow: /private\nDisallow: /en/persons/Staff-Only\n\nSitemap: {uri}/sitemap.xml\n");
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(robots))
        .mount(server)
        .await;

    let mut entries = vec![format!("{uri}/sitemap/publications.xml")];
    if with_persons {
        entries.insert(0, format!("{uri}/sitemap/persons.xml"));
    }
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index(&entries)))
        .mount(server)
        .await;

    let persons = urlset(&[
        format!("{uri}/en/persons/alice-smith/"),
        format!("{uri}/en/persons/bob-jones"),
        format!("{uri}/en/persons/carol-white"),
        format!("{uri}/private/hidden"),
        format!("{uri}/en/persons/Staff-Only-Jane"),
    ]);
    Mock::given(method("GET"))
        .and(path("/sitemap/persons.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(persons))
        .mount(server)
        .await;

    let publications = urlset(&[
        format!("{uri}/en/publications/pinns"),
        format!("{uri}/en/publications/contracts"),
        format!("{uri}/en/publications/broken"),
    ]);
    Mock::given(method("GET"))
        .and(path("/sitemap/publications.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(publications))
        .mount(server)
        .await;
}

/// Page mocks with the exact number of hits a single full crawl should make.
async fn mount_pages(server: &MockServer) {
    get(server, "/en/persons/alice-smith", 200, person_page("Alice Smith", "Centre for Computational Science and Mathematical Modelling"), 1).await;
    get(server, "/en/persons/bob-jones", 200, person_page("Bob Jones", "School of Law"), 1).await;
    get(server, "/en/persons/carol-white", 500, "", 1).await;
    get(server, "/private/hidden", 200, person_page("Hidden", "Computational Science"), 0).await;
    // the lowercased form is what would be requested if the mixed-case rule were missed
    get(server, "/en/persons/staff-only-jane", 200, person_page("Jane", "Computational Science"), 0).await;
    // fetched once for discovery and once for details
    get(server, "/en/publications/pinns", 200, PINNS, 2).await;
    get(server, "/en/publications/contracts", 200, CONTRACTS, 1).await;
    get(server, "/en/publications/broken", 404, "", 1).await;
}

fn config(server: &MockServer, data_dir: &Path) -> CrawlConfig {
    let mut config = CrawlConfig::new(Url::parse(&server.uri()).unwrap()).unwrap();
    config.data_dir = data_dir.to_path_buf();
    config.min_delay = Duration::ZERO;
    config.max_delay = Duration::from_millis(5);
    config.person_concurrency = 2;
    config.publication_concurrency = 4;
    config.publication_sitemap_pages = 2;
    config.timeout = Duration::from_secs(5);
    config
}

#[tokio::test]
async fn full_crawl_populates_state() {
    let server = MockServer::start().await;
    mount_discovery(&server, true).await;
    mount_pages(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    let summary = crawl(&config).await.unwrap();
    assert_eq!(summary.new_persons, 3);
    assert_eq!(summary.new_publications, 3);
    assert_eq!(summary.populated_details, 1);

    let uri = server.uri().to_lowercase();
    let persons: Vec<PersonRecord> = load_records(&config.persons_path()).unwrap();
    assert_eq!(persons.len(), 3);
    let alice = persons.iter().find(|p| p.name == "Alice Smith").unwrap();
    assert_eq!(alice.url, format!("{uri}/en/persons/alice-smith"));
    assert!(alice.interested);
    let carol = persons.iter().find(|p| p.url.ends_with("carol-white")).unwrap();
    assert_eq!(carol, &PersonRecord::placeholder(carol.url.clone()));
    assert!(!persons.iter().any(|p| p.url.contains("private") || p.url.contains("staff-only")));

    let stubs: Vec<PublicationStub> = load_records(&config.publications_path()).unwrap();
    assert_eq!(stubs.len(), 3);
    let interested: Vec<_> = stubs.iter().filter(|s| s.interested).map(|s| s.url.as_str()).collect();
    assert_eq!(interested, vec![format!("{uri}/en/publications/pinns")]);

    let snapshot = load_snapshot(&config.snapshot_path()).unwrap();
    assert_eq!(snapshot.len(), 1);
    let detail = &snapshot.publications[0];
    assert_eq!(detail.title.as_deref(), Some("Physics-informed neural networks for flow"));
    assert_eq!(detail.abstract_text.as_deref(), Some("Surrogates for fluid flow."));
    assert_eq!(detail.citations, Some(5));
    assert_eq!(detail.journal.as_deref(), Some("Computers & Fluids"));
    assert_eq!(detail.publication_date.as_deref(), Some("Published - 2 May 2022"));
    assert_eq!(detail.authors.len(), 2);
    assert_eq!(detail.authors[0].url.as_deref(), Some(format!("{}/en/persons/alice-smith", server.uri()).as_str()));
    assert_eq!(detail.authors[1].url, None);
}

#[tokio::test]
async fn second_run_fetches_nothing_new() {
    let server = MockServer::start().await;
    mount_discovery(&server, true).await;
    mount_pages(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    crawl(&config).await.unwrap();
    let persons_before = fs::read(config.persons_path()).unwrap();
    let stubs_before = fs::read(config.publications_path()).unwrap();
    let snapshot_before = load_snapshot(&config.snapshot_path()).unwrap();

    let summary = crawl(&config).await.unwrap();
    assert_eq!(summary.new_persons, 0);
    assert_eq!(summary.new_publications, 0);
    assert_eq!(summary.populated_details, 0);
    assert_eq!(fs::read(config.persons_path()).unwrap(), persons_before);
    assert_eq!(fs::read(config.publications_path()).unwrap(), stubs_before);
    assert_eq!(load_snapshot(&config.snapshot_path()).unwrap(), snapshot_before);
    // page hit counts are verified when the server drops
}

#[tokio::test]
async fn previously_failed_url_is_left_alone() {
    let server = MockServer::start().await;
    mount_discovery(&server, true).await;
    get(&server, "/en/persons/alice-smith", 200, person_page("Alice Smith", "Law"), 1).await;
    get(&server, "/en/persons/bob-jones", 200, person_page("Bob Jones", "Law"), 1).await;
    // the site has recovered, but the placeholder already on disk wins
    get(&server, "/en/persons/carol-white", 200, person_page("Carol White", "Computational Science"), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());
    let carol_url = format!("{}/en/persons/carol-white", server.uri().to_lowercase());
    let placeholder = serde_json::to_string(&PersonRecord::placeholder(carol_url.clone())).unwrap();
    fs::write(config.persons_path(), format!("{placeholder}\n")).unwrap();

    let fetcher = Fetcher::new(&config).unwrap();
    assert_eq!(crawl_persons(&config, &fetcher).await.unwrap(), 2);

    let persons: Vec<PersonRecord> = load_records(&config.persons_path()).unwrap();
    assert_eq!(persons.len(), 3);
    assert_eq!(persons[0], PersonRecord::placeholder(carol_url));
}

#[tokio::test]
async fn missing_persons_sitemap_is_fatal() {
    let server = MockServer::start().await;
    mount_discovery(&server, false).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    let err = crawl(&config).await.unwrap_err();
    assert!(matches!(err, CrawlError::MissingSitemap(ref p) if p == "persons.xml"), "{err}");
    assert!(!config.snapshot_path().exists());
}

#[tokio::test]
async fn unreachable_robots_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());
    let err = crawl(&config).await.unwrap_err();
    assert!(matches!(err, CrawlError::Discovery(_)), "{err}");
}

#[tokio::test]
async fn person_permits_bound_in_flight_fetches() {
    const PAGES: u32 = 6;
    const PERMITS: usize = 2;
    let delay = Duration::from_millis(300);

    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("Sitemap: {uri}/sitemap.xml\n")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index(&[format!("{uri}/sitemap/persons.xml")])))
        .mount(&server)
        .await;
    let people: Vec<String> = (0..PAGES).map(|i| format!("{uri}/en/persons/p{i}")).collect();
    Mock::given(method("GET"))
        .and(path("/sitemap/persons.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&people)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/en/persons/p\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(person_page("Someone", "Law")).set_delay(delay))
        .expect(PAGES as u64)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&server, dir.path());
    config.max_delay = Duration::ZERO;
    config.person_concurrency = PERMITS;
    let fetcher = Fetcher::new(&config).unwrap();

    let start = Instant::now();
    assert_eq!(crawl_persons(&config, &fetcher).await.unwrap(), PAGES as usize);
    let elapsed = start.elapsed();

    // ceil(6 / 2) waves of delayed responses at the very least
    let waves = (PAGES as usize).div_ceil(PERMITS) as u32;
    assert!(elapsed >= delay * waves, "finished in {elapsed:?}, faster than {waves} waves allow");
    // and well short of fetching one page at a time
    assert!(elapsed < delay * PAGES, "finished in {elapsed:?}, no overlap between fetches");
}
