use crate::error::LinkRejection;
use url::Url;

/// Resolve `href` against the page it appears on and drop the fragment.
pub fn resolve_link(base: &Url, href: &str) -> Result<Url, LinkRejection> {
    let href = href.trim();
    if href.is_empty() {
        return Err(LinkRejection::Empty);
    }
    if href.contains(['\'', '"']) {
        return Err(LinkRejection::Quote);
    }
    let mut url = base.join(href).map_err(|e| LinkRejection::Malformed(e.to_string()))?;
    url.set_fragment(None);
    if url.as_str().contains(['\'', '"']) {
        return Err(LinkRejection::Quote);
    }
    Ok(url)
}

/// Only http(s) targets are queued for fetching.
pub fn is_crawlable(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Parse a seed, accepting bare hosts like `example.com`.
pub fn parse_seed(seed: &str) -> Option<Url> {
    let seed = seed.trim();
    let mut url = Url::parse(seed).or_else(|_| Url::parse(&format!("https://{seed}"))).ok()?;
    url.set_fragment(None);
    is_crawlable(&url).then_some(url)
}
