use crate::error::CrawlError;
use reqwest::{header, Client};
use std::future::Future;
use std::time::Duration;
use url::Url;

/// Bodies larger than this are not indexed.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Retrieves the raw body of a page. Any failure means "skip this url".
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, CrawlError>> + Send;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, CrawlError> {
        let resp = self.client.get(url.clone()).send().await.map_err(|e| CrawlError::Fetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CrawlError::Fetch(format!("status {}", resp.status())));
        }
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            if !ct.starts_with("text/html") {
                return Err(CrawlError::Fetch(format!("content type {ct}")));
            }
        }
        let bytes = resp.bytes().await.map_err(|e| CrawlError::Fetch(e.to_string()))?;
        if bytes.len() > MAX_BODY_BYTES {
            return Err(CrawlError::Fetch(format!("body of {} bytes exceeds limit", bytes.len())));
        }
        Ok(bytes.to_vec())
    }
}
