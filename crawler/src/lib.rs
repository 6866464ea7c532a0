//! Breadth-first crawler that fills an [`IndexStore`].
//!
//! Each depth level is fetched and parsed on a bounded pool of tokio tasks.
//! The coordinating task claims every url before spawning its worker and is
//! the only writer to the store, committing one page per transaction.

pub mod error;
pub mod fetch;
pub mod links;
pub mod parse;

pub use error::{CrawlError, LinkRejection};
pub use fetch::{Fetcher, HttpFetcher};
pub use parse::{Anchor, HtmlParser, PageParser, ParsedPage};

use linkdex_core::{IndexStore, PageCommit, PageLink, PageUnit};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio::task::JoinSet;
use url::Url;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Pages fetched concurrently within one depth level.
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    /// Stop claiming new pages once this many were indexed in the run.
    pub max_pages: Option<usize>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self { concurrency: 16, fetch_timeout: Duration::from_secs(12), max_pages: None }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub pages_indexed: usize,
    pub pages_skipped: usize,
    /// Fetched pages with no indexable words; they stay unindexed.
    pub pages_empty: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub store_failures: usize,
    pub links_recorded: usize,
    pub links_rejected: usize,
    pub depth_reached: usize,
    pub started_at: String,
    pub finished_at: String,
}

pub struct Crawler<F, P> {
    store: IndexStore,
    fetcher: Arc<F>,
    parser: Arc<P>,
    config: CrawlConfig,
}

impl Crawler<HttpFetcher, HtmlParser> {
    pub fn http(store: IndexStore, user_agent: &str, config: CrawlConfig) -> reqwest::Result<Self> {
        let fetcher = HttpFetcher::new(user_agent, config.fetch_timeout)?;
        Ok(Self::new(store, fetcher, HtmlParser, config))
    }
}

impl<F: Fetcher, P: PageParser> Crawler<F, P> {
    pub fn new(store: IndexStore, fetcher: F, parser: P, config: CrawlConfig) -> Self {
        Self { store, fetcher: Arc::new(fetcher), parser: Arc::new(parser), config }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Crawl `max_depth` levels starting from `seeds`; a depth of 1 indexes
    /// only the seeds. Page failures are logged and counted, never fatal.
    pub async fn crawl<S: AsRef<str>>(&self, seeds: &[S], max_depth: usize) -> CrawlReport {
        let mut report = CrawlReport { started_at: now(), ..Default::default() };
        let mut frontier: BTreeSet<Url> = BTreeSet::new();
        for seed in seeds {
            let seed: &str = seed.as_ref();
            match links::parse_seed(seed) {
                Some(url) => {
                    frontier.insert(url);
                }
                None => tracing::warn!(seed, "ignoring invalid seed"),
            }
        }

        let mut claimed: HashSet<String> = HashSet::new();
        for depth in 0..max_depth {
            if frontier.is_empty() || self.page_budget_spent(&report) {
                break;
            }
            tracing::info!(depth, frontier = frontier.len(), "crawling depth");
            report.depth_reached = depth + 1;
            let mut next: BTreeSet<Url> = BTreeSet::new();
            let mut pending = std::mem::take(&mut frontier).into_iter();
            let mut tasks: JoinSet<(Url, Result<ParsedPage, CrawlError>)> = JoinSet::new();

            loop {
                while tasks.len() < self.config.concurrency.max(1) {
                    if self.page_budget_spent_with(&report, tasks.len()) {
                        break;
                    }
                    let Some(url) = pending.next() else { break };
                    if !self.claim(&url, &mut claimed) {
                        report.pages_skipped += 1;
                        continue;
                    }
                    tasks.spawn(self.visit(url));
                }
                let Some(joined) = tasks.join_next().await else { break };
                match joined {
                    Ok((url, Ok(page))) => self.index(&url, page, &claimed, &mut next, &mut report),
                    Ok((url, Err(e))) => {
                        tracing::warn!(url = %url, error = %e, "skipping page");
                        match e {
                            CrawlError::Parse(_) => report.parse_failures += 1,
                            CrawlError::Fetch(_) | CrawlError::Timeout(_) => report.fetch_failures += 1,
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "crawl task failed");
                        report.fetch_failures += 1;
                    }
                }
            }
            frontier = next;
        }

        report.finished_at = now();
        tracing::info!(
            indexed = report.pages_indexed,
            skipped = report.pages_skipped,
            empty = report.pages_empty,
            fetch_failures = report.fetch_failures,
            parse_failures = report.parse_failures,
            links = report.links_recorded,
            "crawl finished"
        );
        report
    }

    fn page_budget_spent(&self, report: &CrawlReport) -> bool {
        self.page_budget_spent_with(report, 0)
    }

    fn page_budget_spent_with(&self, report: &CrawlReport, in_flight: usize) -> bool {
        self.config.max_pages.is_some_and(|max| report.pages_indexed + in_flight >= max)
    }

    /// Reserve a url for this run. Fails if it was claimed before or is
    /// already in the index.
    fn claim(&self, url: &Url, claimed: &mut HashSet<String>) -> bool {
        if claimed.contains(url.as_str()) {
            return false;
        }
        match self.store.is_indexed(url.as_str()) {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                tracing::error!(url = %url, error = %e, "index lookup failed");
                return false;
            }
        }
        claimed.insert(url.to_string())
    }

    /// Fetch and parse one page off the coordinating task.
    fn visit(&self, url: Url) -> impl std::future::Future<Output = (Url, Result<ParsedPage, CrawlError>)> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        let parser = Arc::clone(&self.parser);
        let timeout = self.config.fetch_timeout;
        async move {
            let fetched = tokio::time::timeout(timeout, fetcher.fetch(&url)).await;
            let body = match fetched {
                Ok(Ok(body)) => body,
                Ok(Err(e)) => return (url, Err(e)),
                Err(_) => return (url, Err(CrawlError::Timeout(timeout))),
            };
            let parsed = parser.parse(&body);
            (url, parsed)
        }
    }

    /// Build the page's unit of work, commit it, and queue its new targets.
    fn index(
        &self,
        url: &Url,
        page: ParsedPage,
        claimed: &HashSet<String>,
        next: &mut BTreeSet<Url>,
        report: &mut CrawlReport,
    ) {
        let mut unit = PageUnit::from_text(url.as_str(), &page.text);
        let mut queued = Vec::new();
        for anchor in &page.anchors {
            let target = match links::resolve_link(url, &anchor.href) {
                Ok(target) => target,
                Err(e) => {
                    tracing::debug!(page = %url, href = %anchor.href, reason = %e, "dropping link");
                    report.links_rejected += 1;
                    continue;
                }
            };
            if links::is_crawlable(&target) && !claimed.contains(target.as_str()) {
                match self.store.is_indexed(target.as_str()) {
                    Ok(false) => queued.push(target.clone()),
                    Ok(true) => {}
                    Err(e) => tracing::warn!(url = %target, error = %e, "index lookup failed"),
                }
            }
            unit.links.push(PageLink::new(target.as_str(), &anchor.text));
        }

        match self.store.commit_page(&unit) {
            Ok(PageCommit::Indexed { locations, links, .. }) => {
                tracing::info!(url = %url, words = locations, links, "indexed page");
                report.pages_indexed += 1;
                report.links_recorded += links;
                next.extend(queued);
            }
            Ok(PageCommit::AlreadyIndexed { .. }) => {
                tracing::debug!(url = %url, "page indexed concurrently");
                report.pages_skipped += 1;
            }
            Ok(PageCommit::NoContent { .. }) => {
                tracing::warn!(url = %url, "page has no indexable words");
                report.pages_empty += 1;
            }
            Err(e) => {
                tracing::error!(url = %url, error = %e, "discarding page");
                report.store_failures += 1;
            }
        }
    }
}

fn now() -> String {
    time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
