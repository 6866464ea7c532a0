use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};

pub type UrlId = u64;
pub type WordId = u64;
pub type LinkId = u64;
/// 0-based token offset within a page's extracted text.
pub type Position = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRow {
    pub from: UrlId,
    pub to: UrlId,
}

/// An outgoing link of a page, with the tokens of its anchor text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub target: String,
    pub anchor_words: Vec<String>,
}

impl PageLink {
    pub fn new(target: impl Into<String>, anchor_text: &str) -> Self {
        Self { target: target.into(), anchor_words: tokenize(anchor_text).map(|(w, _)| w).collect() }
    }
}

/// Everything one page contributes to the index. Committed as a single unit
/// by [`crate::IndexStore::commit_page`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUnit {
    pub url: String,
    pub words: Vec<(String, Position)>,
    pub links: Vec<PageLink>,
}

impl PageUnit {
    pub fn from_text(url: impl Into<String>, text: &str) -> Self {
        let words = tokenize(text).map(|(w, pos)| (w, pos as Position)).collect();
        Self { url: url.into(), words, links: Vec::new() }
    }

    pub fn with_link(mut self, link: PageLink) -> Self {
        self.links.push(link);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCommit {
    Indexed { url_id: UrlId, locations: usize, links: usize },
    /// The page was already indexed when the transaction ran; nothing was written.
    AlreadyIndexed { url_id: UrlId },
    /// The page had no indexable words. Only its url entry exists.
    NoContent { url_id: UrlId },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub urls: usize,
    pub words: usize,
    pub indexed_pages: usize,
    pub word_locations: usize,
    pub links: usize,
    pub ranked_pages: usize,
    pub created_at: String,
}
