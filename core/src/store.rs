use crate::error::StoreError;
use crate::index::{LinkId, LinkRow, PageCommit, PageUnit, Position, StoreStats, UrlId, WordId};
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional, TransactionalTree,
};
use sled::{Batch, Db, Tree};
use std::collections::HashMap;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub const SCHEMA_VERSION: u32 = 1;

const META_KEY: &[u8] = b"meta";
const EMPTY: &[u8] = &[];

type TxResult<T> = ConflictableTransactionResult<T, StoreError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
}

/// Durable word-location index and link graph on top of sled.
///
/// Ids are big-endian `u64` so that composite keys sort by their leading id
/// and prefix scans answer the per-word and per-url lookups.
///
/// | tree         | key                         | value          |
/// |--------------|-----------------------------|----------------|
/// | `urls`       | url                         | url id         |
/// | `url_names`  | url id                      | url            |
/// | `words`      | word                        | word id        |
/// | `locations`  | word id, url id, position   | -              |
/// | `indexed`    | url id                      | location count |
/// | `links`      | link id                     | [`LinkRow`]    |
/// | `links_out`  | from id, link id            | to id          |
/// | `links_in`   | to id, from id, link id     | -              |
/// | `link_words` | word id, link id            | -              |
/// | `page_rank`  | url id                      | f64 score      |
#[derive(Clone)]
pub struct IndexStore {
    db: Db,
    urls: Tree,
    url_names: Tree,
    words: Tree,
    locations: Tree,
    indexed: Tree,
    links: Tree,
    links_out: Tree,
    links_in: Tree,
    link_words: Tree,
    page_rank: Tree,
}

impl IndexStore {
    /// Open or create a store directory. Safe to call on an existing store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// A store that lives in a temp directory and is removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let store = Self {
            urls: db.open_tree("urls")?,
            url_names: db.open_tree("url_names")?,
            words: db.open_tree("words")?,
            locations: db.open_tree("locations")?,
            indexed: db.open_tree("indexed")?,
            links: db.open_tree("links")?,
            links_out: db.open_tree("links_out")?,
            links_in: db.open_tree("links_in")?,
            link_words: db.open_tree("link_words")?,
            page_rank: db.open_tree("page_rank")?,
            db,
        };
        store.ensure_meta()?;
        Ok(store)
    }

    fn ensure_meta(&self) -> Result<MetaFile, StoreError> {
        if let Some(raw) = self.db.get(META_KEY)? {
            let meta: MetaFile = serde_json::from_slice(&raw)?;
            if meta.version != SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch { found: meta.version, expected: SCHEMA_VERSION });
            }
            return Ok(meta);
        }
        let meta = MetaFile {
            version: SCHEMA_VERSION,
            created_at: time::OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
        };
        self.db.insert(META_KEY, serde_json::to_vec(&meta)?)?;
        tracing::info!(version = SCHEMA_VERSION, "created index store");
        Ok(meta)
    }

    pub fn meta(&self) -> Result<MetaFile, StoreError> {
        self.ensure_meta()
    }

    // --- writes ---

    pub fn get_or_create_url_id(&self, url: &str) -> Result<UrlId, StoreError> {
        self.transact(|tx| tx.url_id(url))
    }

    pub fn get_or_create_word_id(&self, word: &str) -> Result<WordId, StoreError> {
        self.transact(|tx| tx.word_id(word))
    }

    /// Append location rows for a page. Callers gate on [`Self::is_indexed`];
    /// a repeated (word, position) pair for the same url collapses into one row.
    pub fn record_word_locations(&self, url_id: UrlId, rows: &[(WordId, Position)]) -> Result<(), StoreError> {
        self.transact(|tx| tx.push_locations(url_id, rows).map(|_| ()))
    }

    /// Insert a link and its anchor words. Self-loops are rejected and yield `None`.
    pub fn record_link(&self, from: UrlId, to: UrlId, anchor_words: &[WordId]) -> Result<Option<LinkId>, StoreError> {
        if from == to {
            tracing::debug!(url_id = from, "self-loop link rejected");
            return Ok(None);
        }
        self.transact(|tx| tx.push_link(from, to, anchor_words))
    }

    /// Index one page atomically: either all of its words, locations and links
    /// are committed or none are. The indexed check is repeated inside the
    /// transaction, so concurrent writers cannot index the same page twice.
    ///
    /// A page without indexable words stays unindexed and records only its
    /// url; its links are not stored, since the page would be fetched again
    /// by the next crawl and would otherwise add the same links once more.
    pub fn commit_page(&self, page: &PageUnit) -> Result<PageCommit, StoreError> {
        self.transact(|tx| {
            let url_id = tx.url_id(&page.url)?;
            if tx.is_indexed(url_id)? {
                return Ok(PageCommit::AlreadyIndexed { url_id });
            }
            if page.words.is_empty() {
                return Ok(PageCommit::NoContent { url_id });
            }
            let mut rows = Vec::with_capacity(page.words.len());
            for (word, pos) in &page.words {
                rows.push((tx.word_id(word)?, *pos));
            }
            let locations = tx.push_locations(url_id, &rows)?;

            let mut links = 0;
            for link in &page.links {
                let to = tx.url_id(&link.target)?;
                let mut anchor = Vec::with_capacity(link.anchor_words.len());
                for word in &link.anchor_words {
                    anchor.push(tx.word_id(word)?);
                }
                if tx.push_link(url_id, to, &anchor)?.is_some() {
                    links += 1;
                }
            }
            Ok(PageCommit::Indexed { url_id, locations, links })
        })
    }

    /// Replace every stored PageRank score with `scores` in one atomic batch.
    pub fn replace_page_rank(&self, scores: &HashMap<UrlId, f64>) -> Result<(), StoreError> {
        let mut batch = Batch::default();
        for key in self.page_rank.iter().keys() {
            batch.remove(key?);
        }
        for (url_id, score) in scores {
            batch.insert(&id_key(*url_id)[..], &score.to_be_bytes()[..]);
        }
        self.page_rank.apply_batch(batch)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush()?)
    }

    // --- reads ---

    pub fn url_id(&self, url: &str) -> Result<Option<UrlId>, StoreError> {
        self.urls.get(url.as_bytes())?.map(|raw| decode_u64(&raw, "urls")).transpose()
    }

    pub fn word_id(&self, word: &str) -> Result<Option<WordId>, StoreError> {
        self.words.get(word.as_bytes())?.map(|raw| decode_u64(&raw, "words")).transpose()
    }

    pub fn url(&self, url_id: UrlId) -> Result<Option<String>, StoreError> {
        match self.url_names.get(id_key(url_id))? {
            Some(raw) => String::from_utf8(raw.to_vec()).map(Some).map_err(|_| StoreError::Corrupt("url_names")),
            None => Ok(None),
        }
    }

    /// True iff the url is known and at least one word location references it.
    pub fn is_indexed(&self, url: &str) -> Result<bool, StoreError> {
        match self.url_id(url)? {
            Some(url_id) => self.is_indexed_id(url_id),
            None => Ok(false),
        }
    }

    pub fn is_indexed_id(&self, url_id: UrlId) -> Result<bool, StoreError> {
        Ok(self.indexed.contains_key(id_key(url_id))?)
    }

    pub fn indexed_url_ids(&self) -> Result<Vec<UrlId>, StoreError> {
        self.indexed.iter().keys().map(|key| decode_u64(&key?, "indexed")).collect()
    }

    /// Distinct pages linking to `url_id`, in id order.
    pub fn links_into(&self, url_id: UrlId) -> Result<Vec<UrlId>, StoreError> {
        let mut linkers: Vec<UrlId> = Vec::new();
        for key in self.links_in.scan_prefix(id_key(url_id)).keys() {
            let from = decode_u64(&key?[8..], "links_in")?;
            if linkers.last() != Some(&from) {
                linkers.push(from);
            }
        }
        Ok(linkers)
    }

    /// Number of outgoing link rows, parallel edges counted separately.
    pub fn out_degree(&self, url_id: UrlId) -> Result<usize, StoreError> {
        let mut n = 0;
        for key in self.links_out.scan_prefix(id_key(url_id)).keys() {
            key?;
            n += 1;
        }
        Ok(n)
    }

    pub fn word_locations_for(&self, word_id: WordId) -> Result<Vec<(UrlId, Position)>, StoreError> {
        let mut rows = Vec::new();
        for key in self.locations.scan_prefix(id_key(word_id)).keys() {
            let key = key?;
            let url_id = decode_u64(&key[8..], "locations")?;
            let pos = key
                .get(16..20)
                .and_then(|b| <[u8; 4]>::try_from(b).ok())
                .map(Position::from_be_bytes)
                .ok_or(StoreError::Corrupt("locations"))?;
            rows.push((url_id, pos));
        }
        Ok(rows)
    }

    /// Every link row in the graph.
    pub fn links(&self) -> Result<Vec<(LinkId, LinkRow)>, StoreError> {
        let mut out = Vec::new();
        for item in self.links.iter() {
            let (key, value) = item?;
            out.push((decode_u64(&key, "links")?, bincode::deserialize(&value)?));
        }
        Ok(out)
    }

    /// Links whose anchor text contains `word_id`.
    pub fn links_with_word(&self, word_id: WordId) -> Result<Vec<(LinkId, LinkRow)>, StoreError> {
        let mut out = Vec::new();
        for key in self.link_words.scan_prefix(id_key(word_id)).keys() {
            let link_id = decode_u64(&key?[8..], "link_words")?;
            if let Some(raw) = self.links.get(id_key(link_id))? {
                out.push((link_id, bincode::deserialize(&raw)?));
            }
        }
        Ok(out)
    }

    pub fn page_rank(&self, url_id: UrlId) -> Result<Option<f64>, StoreError> {
        self.page_rank.get(id_key(url_id))?.map(|raw| decode_f64(&raw)).transpose()
    }

    pub fn page_ranks(&self) -> Result<HashMap<UrlId, f64>, StoreError> {
        let mut out = HashMap::new();
        for item in self.page_rank.iter() {
            let (key, value) = item?;
            out.insert(decode_u64(&key, "page_rank")?, decode_f64(&value)?);
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            urls: self.urls.len(),
            words: self.words.len(),
            indexed_pages: self.indexed.len(),
            word_locations: self.locations.len(),
            links: self.links.len(),
            ranked_pages: self.page_rank.len(),
            created_at: self.meta()?.created_at,
        })
    }

    fn transact<A>(&self, f: impl Fn(&PageTx<'_>) -> TxResult<A>) -> Result<A, StoreError> {
        let trees = (
            &self.urls,
            &self.url_names,
            &self.words,
            &self.locations,
            &self.indexed,
            &self.links,
            &self.links_out,
            &self.links_in,
            &self.link_words,
        );
        trees
            .transaction(|(urls, url_names, words, locations, indexed, links, links_out, links_in, link_words)| {
                let tx = PageTx {
                    urls,
                    url_names,
                    words,
                    locations,
                    indexed,
                    links,
                    links_out,
                    links_in,
                    link_words,
                };
                f(&tx)
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => StoreError::Sled(e),
            })
    }
}

/// Transactional view over the index trees. Reads see the writes made earlier
/// in the same transaction.
struct PageTx<'t> {
    urls: &'t TransactionalTree,
    url_names: &'t TransactionalTree,
    words: &'t TransactionalTree,
    locations: &'t TransactionalTree,
    indexed: &'t TransactionalTree,
    links: &'t TransactionalTree,
    links_out: &'t TransactionalTree,
    links_in: &'t TransactionalTree,
    link_words: &'t TransactionalTree,
}

impl PageTx<'_> {
    /// `Db::generate_id` must not be called inside a transaction.
    fn next_id(&self) -> TxResult<u64> {
        self.urls.generate_id().map_err(ConflictableTransactionError::Storage)
    }

    fn url_id(&self, url: &str) -> TxResult<UrlId> {
        if let Some(raw) = self.urls.get(url.as_bytes())? {
            return decode_u64(&raw, "urls").map_err(ConflictableTransactionError::Abort);
        }
        let id = self.next_id()?;
        self.urls.insert(url.as_bytes(), &id_key(id)[..])?;
        self.url_names.insert(&id_key(id)[..], url.as_bytes())?;
        Ok(id)
    }

    fn word_id(&self, word: &str) -> TxResult<WordId> {
        if let Some(raw) = self.words.get(word.as_bytes())? {
            return decode_u64(&raw, "words").map_err(ConflictableTransactionError::Abort);
        }
        let id = self.next_id()?;
        self.words.insert(word.as_bytes(), &id_key(id)[..])?;
        Ok(id)
    }

    fn is_indexed(&self, url_id: UrlId) -> TxResult<bool> {
        Ok(self.indexed.get(id_key(url_id))?.is_some())
    }

    /// Returns the number of new location rows.
    fn push_locations(&self, url_id: UrlId, rows: &[(WordId, Position)]) -> TxResult<usize> {
        let mut added = 0;
        for (word_id, pos) in rows {
            if self.locations.insert(&location_key(*word_id, url_id, *pos)[..], EMPTY)?.is_none() {
                added += 1;
            }
        }
        if added > 0 {
            let prev = match self.indexed.get(id_key(url_id))? {
                Some(raw) => decode_u64(&raw, "indexed").map_err(ConflictableTransactionError::Abort)?,
                None => 0,
            };
            self.indexed.insert(&id_key(url_id)[..], &id_key(prev + added as u64)[..])?;
        }
        Ok(added)
    }

    fn push_link(&self, from: UrlId, to: UrlId, anchor_words: &[WordId]) -> TxResult<Option<LinkId>> {
        if from == to {
            return Ok(None);
        }
        let link_id = self.next_id()?;
        let row = bincode::serialize(&LinkRow { from, to })
            .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
        self.links.insert(&id_key(link_id)[..], row)?;
        self.links_out.insert(&pair_key(from, link_id)[..], &id_key(to)[..])?;
        self.links_in.insert(&triple_key(to, from, link_id)[..], EMPTY)?;
        for word_id in anchor_words {
            self.link_words.insert(&pair_key(*word_id, link_id)[..], EMPTY)?;
        }
        Ok(Some(link_id))
    }
}

fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn pair_key(a: u64, b: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&b.to_be_bytes());
    key
}

fn triple_key(a: u64, b: u64, c: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(&pair_key(a, b));
    key[16..].copy_from_slice(&c.to_be_bytes());
    key
}

fn location_key(word_id: WordId, url_id: UrlId, pos: Position) -> [u8; 20] {
    let mut key = [0u8; 20];
    key[..16].copy_from_slice(&pair_key(word_id, url_id));
    key[16..].copy_from_slice(&pos.to_be_bytes());
    key
}

/// Decode the leading 8 bytes as a big-endian id.
fn decode_u64(bytes: &[u8], tree: &'static str) -> Result<u64, StoreError> {
    bytes
        .get(..8)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(u64::from_be_bytes)
        .ok_or(StoreError::Corrupt(tree))
}

fn decode_f64(bytes: &[u8]) -> Result<f64, StoreError> {
    bytes
        .get(..8)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(f64::from_be_bytes)
        .ok_or(StoreError::Corrupt("page_rank"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::PageLink;

    #[test]
    fn ids_are_stable() {
        let store = IndexStore::temporary().unwrap();
        let a = store.get_or_create_url_id("http://a/").unwrap();
        let w = store.get_or_create_word_id("honda").unwrap();
        assert_eq!(store.get_or_create_url_id("http://a/").unwrap(), a);
        assert_eq!(store.get_or_create_word_id("honda").unwrap(), w);
        assert_eq!(store.url(a).unwrap().as_deref(), Some("http://a/"));
        assert_eq!(store.word_id("civic").unwrap(), None);
    }

    #[test]
    fn link_target_is_not_indexed() {
        let store = IndexStore::temporary().unwrap();
        let page = PageUnit::from_text("http://a/", "hello world").with_link(PageLink::new("http://b/", "next"));
        store.commit_page(&page).unwrap();
        assert!(store.is_indexed("http://a/").unwrap());
        assert!(store.url_id("http://b/").unwrap().is_some());
        assert!(!store.is_indexed("http://b/").unwrap());
    }

    #[test]
    fn key_prefixes_sort_by_leading_id() {
        assert!(pair_key(1, u64::MAX) < pair_key(2, 0));
        assert!(location_key(7, 1, 9) < location_key(7, 2, 0));
    }

    #[test]
    fn page_rank_is_replaced_wholesale() {
        let store = IndexStore::temporary().unwrap();
        store.replace_page_rank(&HashMap::from([(1, 0.5), (2, 1.5)])).unwrap();
        store.replace_page_rank(&HashMap::from([(3, 2.0)])).unwrap();
        assert_eq!(store.page_rank(1).unwrap(), None);
        assert_eq!(store.page_rank(3).unwrap(), Some(2.0));
        assert_eq!(store.page_ranks().unwrap().len(), 1);
    }
}
