use std::time::Duration;
use thiserror::Error;

/// Per-page failures. Each one skips the page and the crawl continues.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("parse failed: {0}")]
    Parse(String),
}

/// Why a hyperlink was not recorded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkRejection {
    #[error("empty href")]
    Empty,

    #[error("malformed href: {0}")]
    Malformed(String),

    #[error("href contains a quote character")]
    Quote,
}
