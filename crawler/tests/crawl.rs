use crawler::{CrawlConfig, CrawlError, Crawler, Fetcher, HtmlParser};
use linkdex_core::query::{Searcher, DEFAULT_LIMIT};
use linkdex_core::IndexStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

type Hits = Arc<Mutex<HashMap<String, usize>>>;

/// Serves pages from memory and counts requests per url.
#[derive(Default)]
struct SiteFetcher {
    pages: HashMap<String, Vec<u8>>,
    hits: Hits,
    slow: Option<String>,
}

impl SiteFetcher {
    fn new() -> Self {
        let pages = site().into_iter().map(|(u, b)| (u.to_string(), b.as_bytes().to_vec())).collect();
        Self { pages, ..Default::default() }
    }
}

impl Fetcher for SiteFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, CrawlError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if self.slow.as_deref() == Some(url.as_str()) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.pages.get(url.as_str()).cloned().ok_or_else(|| CrawlError::Fetch(format!("404 {url}")))
    }
}

fn site() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "http://cars.test/",
            r#"<html><body><h1>Used cars</h1>
               <a href="honda.html">honda listings</a>
               <a href="/toyota.html#top">toyota listings</a>
               <a href="honda.html">more honda</a>
               <a href="it's.html">bad</a>
               <a href="http://cars.test/">home</a></body></html>"#,
        ),
        (
            "http://cars.test/honda.html",
            r#"<html><body>honda civic honda fit <a href="deep.html">deeper</a> <a href="/">home</a></body></html>"#,
        ),
        ("http://cars.test/toyota.html", r#"<html><body>toyota corolla <a href="honda.html">honda</a></body></html>"#),
        ("http://cars.test/deep.html", "<html><body>deep page</body></html>"),
    ]
}

fn config() -> CrawlConfig {
    CrawlConfig { concurrency: 4, fetch_timeout: Duration::from_millis(200), max_pages: None }
}

fn crawler(fetcher: SiteFetcher) -> Crawler<SiteFetcher, HtmlParser> {
    Crawler::new(IndexStore::temporary().unwrap(), fetcher, HtmlParser, config())
}

#[tokio::test]
async fn crawls_breadth_first_to_depth() {
    let c = crawler(SiteFetcher::new());
    let report = c.crawl(&["http://cars.test/"], 2).await;

    assert_eq!(report.pages_indexed, 3);
    assert_eq!(report.depth_reached, 2);
    assert_eq!(report.links_rejected, 1);
    let store = c.store();
    assert!(store.is_indexed("http://cars.test/honda.html").unwrap());
    assert!(store.is_indexed("http://cars.test/toyota.html").unwrap());
    // known as a link target, but a third level would be needed to index it
    assert!(!store.is_indexed("http://cars.test/deep.html").unwrap());
    assert!(store.url_id("http://cars.test/deep.html").unwrap().is_some());
}

#[tokio::test]
async fn each_page_is_fetched_once() {
    let fetcher = SiteFetcher::new();
    let hits = Arc::clone(&fetcher.hits);
    let c = crawler(fetcher);
    c.crawl(&["http://cars.test/", "http://cars.test/#again"], 4).await;

    {
        let hits = hits.lock().unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits.values().all(|n| *n == 1));
    }

    let again = c.crawl(&["http://cars.test/"], 4).await;
    assert_eq!(again.pages_indexed, 0);
    assert_eq!(again.pages_skipped, 1);
    assert_eq!(hits.lock().unwrap().values().sum::<usize>(), 4);
}

#[tokio::test]
async fn links_are_recorded_per_anchor() {
    let c = crawler(SiteFetcher::new());
    c.crawl(&["http://cars.test/"], 1).await;
    let store = c.store();
    let home = store.url_id("http://cars.test/").unwrap().unwrap();
    let honda = store.url_id("http://cars.test/honda.html").unwrap().unwrap();
    let toyota = store.url_id("http://cars.test/toyota.html").unwrap().unwrap();

    // two anchors to honda and one to toyota; the self link and the quoted link are dropped
    assert_eq!(store.out_degree(home).unwrap(), 3);
    assert_eq!(store.links_into(honda).unwrap(), vec![home]);
    assert_eq!(store.links_into(toyota).unwrap(), vec![home]);
    assert!(store.url_id("http://cars.test/toyota.html#top").unwrap().is_none());
}

#[tokio::test]
async fn failures_skip_the_page_only() {
    let mut fetcher = SiteFetcher::new();
    fetcher.pages.insert("http://cars.test/toyota.html".into(), vec![0xff, 0xfe, 0x00]);
    fetcher.pages.remove("http://cars.test/honda.html");
    fetcher.slow = Some("http://cars.test/deep.html".into());
    let c = crawler(fetcher);
    let report = c.crawl(&["http://cars.test/", "http://cars.test/deep.html", "not a url at all"], 2).await;

    assert_eq!(report.pages_indexed, 1);
    assert_eq!(report.fetch_failures, 2);
    assert_eq!(report.parse_failures, 1);
    assert!(c.store().is_indexed("http://cars.test/").unwrap());
    assert!(!c.store().is_indexed("http://cars.test/honda.html").unwrap());
    assert!(!c.store().is_indexed("http://cars.test/deep.html").unwrap());
}

#[tokio::test]
async fn crawled_pages_are_searchable() {
    let c = crawler(SiteFetcher::new());
    c.crawl(&["http://cars.test/"], 2).await;
    let hits = Searcher::new(c.store()).query("honda civic", DEFAULT_LIMIT).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].url, "http://cars.test/honda.html");
}

#[tokio::test]
async fn page_budget_stops_the_crawl() {
    let config = CrawlConfig { concurrency: 1, max_pages: Some(2), ..config() };
    let c = Crawler::new(IndexStore::temporary().unwrap(), SiteFetcher::new(), HtmlParser, config);
    let report = c.crawl(&["http://cars.test/"], 5).await;
    assert_eq!(report.pages_indexed, 2);
}

#[tokio::test]
async fn pages_without_words_stay_unindexed() {
    let mut fetcher = SiteFetcher::new();
    fetcher.pages.insert("http://cars.test/".into(), br#"the <a href="honda.html"><img src="x.png"></a>"#.to_vec());
    let c = crawler(fetcher);

    for _ in 0..2 {
        let report = c.crawl(&["http://cars.test/"], 2).await;
        assert_eq!(report.pages_indexed, 0);
        assert_eq!(report.pages_empty, 1);
        assert_eq!(report.links_recorded, 0);
    }
    let store = c.store();
    let home = store.url_id("http://cars.test/").unwrap().unwrap();
    assert!(!store.is_indexed_id(home).unwrap());
    assert_eq!(store.out_degree(home).unwrap(), 0);
    assert!(!store.is_indexed("http://cars.test/honda.html").unwrap());
}
