use linkdex_core::pagerank::{compute_page_rank, PageRankConfig};
use linkdex_core::query::{ScoreWeights, Searcher, DEFAULT_LIMIT};
use linkdex_core::{IndexStore, PageLink, PageUnit};
use std::collections::BTreeSet;

fn fixture() -> IndexStore {
    let store = IndexStore::temporary().unwrap();
    let pages = [
        ("http://cars/honda.html", "honda civic honda fit"),
        ("http://cars/review.html", "the civic is a fast honda car"),
        ("http://cars/toyota.html", "toyota corolla fast car"),
        ("http://cars/mixed.html", "car reviews and honda news later civic"),
    ];
    for (url, text) in pages {
        store.commit_page(&PageUnit::from_text(url, text)).unwrap();
    }
    store
}

#[test]
fn unknown_word_gives_nothing() {
    let store = fixture();
    let hits = Searcher::new(&store).query("zzzznotaword", DEFAULT_LIMIT).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn missing_terms_are_dropped_not_fatal() {
    let store = fixture();
    let with_miss = Searcher::new(&store).query("toyota zzzznotaword", DEFAULT_LIMIT).unwrap();
    assert_eq!(with_miss.len(), 1);
    assert_eq!(with_miss[0].url, "http://cars/toyota.html");
}

#[test]
fn two_terms_return_the_intersection() {
    let store = fixture();
    let searcher = Searcher::new(&store);
    let urls_of = |word: &str| -> BTreeSet<u64> {
        let id = store.word_id(word).unwrap().unwrap();
        store.word_locations_for(id).unwrap().into_iter().map(|(u, _)| u).collect()
    };
    for (w1, w2) in [("honda", "civic"), ("fast", "car"), ("honda", "toyota"), ("car", "civic")] {
        let expected: BTreeSet<u64> = urls_of(w1).intersection(&urls_of(w2)).copied().collect();
        let got: BTreeSet<u64> =
            searcher.query(&format!("{w1} {w2}"), 100).unwrap().into_iter().map(|h| h.url_id).collect();
        assert_eq!(got, expected, "query {w1} {w2}");
    }
}

#[test]
fn frequent_early_close_terms_rank_first() {
    let store = fixture();
    let hits = Searcher::new(&store).query("honda civic", DEFAULT_LIMIT).unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].url, "http://cars/honda.html");
    assert!((hits[0].score - 3.0).abs() < 1e-9);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn single_candidate_scores_one_per_signal() {
    let store = fixture();
    let hits = Searcher::new(&store).query("toyota", DEFAULT_LIMIT).unwrap();
    assert_eq!(hits.len(), 1);
    assert!((hits[0].score - 3.0).abs() < 1e-9);
}

#[test]
fn ties_break_by_url() {
    let store = IndexStore::temporary().unwrap();
    for url in ["http://z/", "http://a/", "http://m/"] {
        store.commit_page(&PageUnit::from_text(url, "same words")).unwrap();
    }
    let hits = Searcher::new(&store).query("same words", 2).unwrap();
    let urls: Vec<_> = hits.iter().map(|h| h.url.as_str()).collect();
    assert_eq!(urls, vec!["http://a/", "http://m/"]);
}

#[test]
fn queries_are_case_insensitive() {
    let store = fixture();
    let hits = Searcher::new(&store).query("TOYOTA", DEFAULT_LIMIT).unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn page_rank_weight_reorders_equal_pages() {
    let store = IndexStore::temporary().unwrap();
    store.commit_page(&PageUnit::from_text("http://a/", "rust")).unwrap();
    store.commit_page(&PageUnit::from_text("http://b/", "rust")).unwrap();
    for hub in ["http://h1/", "http://h2/"] {
        let page = PageUnit::from_text(hub, "hub").with_link(PageLink::new("http://b/", "rust guide"));
        store.commit_page(&page).unwrap();
    }
    compute_page_rank(&store, &PageRankConfig::default()).unwrap();

    let plain = Searcher::new(&store).query("rust", DEFAULT_LIMIT).unwrap();
    assert_eq!(plain[0].url, "http://a/");

    let weights = ScoreWeights { page_rank: 1.0, ..Default::default() };
    let ranked = Searcher::new(&store).with_weights(weights).query("rust", DEFAULT_LIMIT).unwrap();
    assert_eq!(ranked[0].url, "http://b/");

    let weights = ScoreWeights { link_text: 1.0, ..Default::default() };
    let by_anchor = Searcher::new(&store).with_weights(weights).search("rust", DEFAULT_LIMIT).unwrap();
    assert_eq!(by_anchor.total_hits, 2);
    assert_eq!(by_anchor.hits[0].url, "http://b/");
    assert!((by_anchor.hits[0].score - 4.0).abs() < 1e-9);
}
