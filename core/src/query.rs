use crate::error::StoreError;
use crate::index::{Position, UrlId, WordId};
use crate::store::IndexStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_LIMIT: usize = 10;

/// Floor for divisors during normalization.
const VSMALL: f64 = 0.00001;

/// Weights of the ranking signals. PageRank and link text are off unless set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub frequency: f64,
    pub location: f64,
    pub distance: f64,
    pub page_rank: f64,
    pub link_text: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { frequency: 1.0, location: 1.0, distance: 1.0, page_rank: 0.0, link_text: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f64,
    pub url_id: UrlId,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub word_ids: Vec<WordId>,
    pub total_hits: usize,
    pub hits: Vec<SearchHit>,
}

/// A page containing every resolved query term.
///
/// `positions[i]` lists, in ascending order, where the i-th term occurs on the
/// page. A join row picks one position per term, so a candidate stands for
/// the cartesian product of its position lists; the aggregates below are
/// computed over that product without enumerating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url_id: UrlId,
    pub positions: Vec<Vec<Position>>,
}

impl Candidate {
    /// Number of join rows for this page.
    pub fn row_count(&self) -> f64 {
        self.positions.iter().map(|p| p.len() as f64).product()
    }

    /// Smallest sum of positions over all rows.
    pub fn min_location(&self) -> u64 {
        self.positions.iter().filter_map(|p| p.iter().min()).map(|&p| u64::from(p)).sum()
    }

    /// Smallest sum of gaps between consecutive terms over all rows, or
    /// `None` for a single-term query.
    pub fn min_distance(&self) -> Option<u64> {
        if self.positions.len() < 2 {
            return None;
        }
        let mut best: Vec<u64> = vec![0; self.positions[0].len()];
        for pair in self.positions.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            best = cur
                .iter()
                .map(|&p| {
                    prev.iter()
                        .zip(&best)
                        .map(|(&q, &d)| d + u64::from(p.abs_diff(q)))
                        .min()
                        .unwrap_or(u64::MAX)
                })
                .collect();
        }
        best.into_iter().min()
    }
}

/// Resolved query terms and the pages that contain all of them.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    pub word_ids: Vec<WordId>,
    pub candidates: Vec<Candidate>,
}

/// Read-only query engine over an [`IndexStore`].
pub struct Searcher<'s> {
    store: &'s IndexStore,
    weights: ScoreWeights,
}

impl<'s> Searcher<'s> {
    pub fn new(store: &'s IndexStore) -> Self {
        Self { store, weights: ScoreWeights::default() }
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Top `limit` pages for a whitespace-separated query.
    pub fn query(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        Ok(self.search(text, limit)?.hits)
    }

    pub fn search(&self, text: &str, limit: usize) -> Result<SearchResults, StoreError> {
        let matches = self.match_rows(text)?;
        if matches.candidates.is_empty() {
            return Ok(SearchResults { word_ids: matches.word_ids, ..Default::default() });
        }
        let scores = self.scored(&matches)?;
        let mut hits = Vec::with_capacity(scores.len());
        for (url_id, score) in scores {
            let url = self.store.url(url_id)?.ok_or(StoreError::Corrupt("url_names"))?;
            hits.push(SearchHit { score, url_id, url });
        }
        hits.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.url.cmp(&b.url))
        });
        let total_hits = hits.len();
        hits.truncate(limit);
        Ok(SearchResults { word_ids: matches.word_ids, total_hits, hits })
    }

    /// Resolve the query terms and join their locations on url (strict AND).
    /// Terms missing from the vocabulary are dropped.
    pub fn match_rows(&self, text: &str) -> Result<MatchSet, StoreError> {
        let mut word_ids = Vec::new();
        for term in text.split_whitespace() {
            let term = term.to_lowercase();
            match self.store.word_id(&term)? {
                Some(id) => word_ids.push(id),
                None => tracing::debug!(term = %term, "query term not in vocabulary"),
            }
        }

        let mut joined: Option<HashMap<UrlId, Vec<Vec<Position>>>> = None;
        for word_id in &word_ids {
            let mut per_url: HashMap<UrlId, Vec<Position>> = HashMap::new();
            for (url_id, pos) in self.store.word_locations_for(*word_id)? {
                per_url.entry(url_id).or_default().push(pos);
            }
            joined = Some(match joined {
                None => per_url.into_iter().map(|(url_id, p)| (url_id, vec![p])).collect(),
                Some(acc) => acc
                    .into_iter()
                    .filter_map(|(url_id, mut lists)| {
                        lists.push(per_url.get(&url_id)?.clone());
                        Some((url_id, lists))
                    })
                    .collect(),
            });
            if joined.as_ref().is_some_and(HashMap::is_empty) {
                break;
            }
        }

        let mut candidates: Vec<Candidate> = joined
            .unwrap_or_default()
            .into_iter()
            .map(|(url_id, mut positions)| {
                positions.iter_mut().for_each(|p| p.sort_unstable());
                Candidate { url_id, positions }
            })
            .collect();
        candidates.sort_by_key(|c| c.url_id);
        Ok(MatchSet { word_ids, candidates })
    }

    /// Weighted sum of the enabled signals for every candidate.
    pub fn scored(&self, matches: &MatchSet) -> Result<HashMap<UrlId, f64>, StoreError> {
        let mut totals: HashMap<UrlId, f64> = matches.candidates.iter().map(|c| (c.url_id, 0.0)).collect();
        let w = &self.weights;
        let mut signals = Vec::new();
        if w.frequency != 0.0 {
            signals.push((w.frequency, frequency_score(&matches.candidates)));
        }
        if w.location != 0.0 {
            signals.push((w.location, location_score(&matches.candidates)));
        }
        if w.distance != 0.0 {
            signals.push((w.distance, distance_score(&matches.candidates)));
        }
        if w.page_rank != 0.0 {
            signals.push((w.page_rank, self.page_rank_score(&matches.candidates)?));
        }
        if w.link_text != 0.0 {
            signals.push((w.link_text, self.link_text_score(matches)?));
        }
        for (weight, scores) in signals {
            for (url_id, total) in totals.iter_mut() {
                *total += weight * scores.get(url_id).copied().unwrap_or(0.0);
            }
        }
        Ok(totals)
    }

    fn page_rank_score(&self, candidates: &[Candidate]) -> Result<HashMap<UrlId, f64>, StoreError> {
        let mut ranks = HashMap::with_capacity(candidates.len());
        for c in candidates {
            ranks.insert(c.url_id, self.store.page_rank(c.url_id)?.unwrap_or(0.0));
        }
        Ok(normalize(&ranks, false))
    }

    /// Sum of the PageRank of every page linking to a candidate with a query
    /// term in the anchor text.
    fn link_text_score(&self, matches: &MatchSet) -> Result<HashMap<UrlId, f64>, StoreError> {
        let mut scores: HashMap<UrlId, f64> = matches.candidates.iter().map(|c| (c.url_id, 0.0)).collect();
        for word_id in &matches.word_ids {
            for (_, link) in self.store.links_with_word(*word_id)? {
                if let Some(score) = scores.get_mut(&link.to) {
                    *score += self.store.page_rank(link.from)?.unwrap_or(0.0);
                }
            }
        }
        Ok(normalize(&scores, false))
    }
}

/// Scale raw scores into 0..=1. With `small_is_better` the smallest raw value
/// maps to 1.0; otherwise the largest does.
pub fn normalize(scores: &HashMap<UrlId, f64>, small_is_better: bool) -> HashMap<UrlId, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }
    if small_is_better {
        let min = scores.values().copied().fold(f64::INFINITY, f64::min).max(VSMALL);
        scores.iter().map(|(u, v)| (*u, min / v.max(VSMALL))).collect()
    } else {
        let max = scores.values().copied().fold(f64::NEG_INFINITY, f64::max).max(VSMALL);
        scores.iter().map(|(u, v)| (*u, v / max)).collect()
    }
}

pub fn frequency_score(candidates: &[Candidate]) -> HashMap<UrlId, f64> {
    let counts: HashMap<UrlId, f64> = candidates.iter().map(|c| (c.url_id, c.row_count())).collect();
    normalize(&counts, false)
}

pub fn location_score(candidates: &[Candidate]) -> HashMap<UrlId, f64> {
    let locations: HashMap<UrlId, f64> = candidates.iter().map(|c| (c.url_id, c.min_location() as f64)).collect();
    normalize(&locations, true)
}

/// Single-term queries score every candidate 1.0.
pub fn distance_score(candidates: &[Candidate]) -> HashMap<UrlId, f64> {
    let mut distances = HashMap::with_capacity(candidates.len());
    for c in candidates {
        match c.min_distance() {
            Some(d) => distances.insert(c.url_id, d as f64),
            None => return candidates.iter().map(|c| (c.url_id, 1.0)).collect(),
        };
    }
    normalize(&distances, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url_id: UrlId, positions: &[&[Position]]) -> Candidate {
        Candidate { url_id, positions: positions.iter().map(|p| p.to_vec()).collect() }
    }

    #[test]
    fn row_aggregates_follow_the_cartesian_product() {
        let c = candidate(1, &[&[0, 10], &[4, 12], &[20]]);
        assert_eq!(c.row_count(), 4.0);
        assert_eq!(c.min_location(), 24);
        // best row is 10, 12, 20
        assert_eq!(c.min_distance(), Some(10));
        assert_eq!(candidate(2, &[&[3]]).min_distance(), None);
    }

    #[test]
    fn normalize_handles_zero_and_empty() {
        assert!(normalize(&HashMap::new(), true).is_empty());
        let zeros = HashMap::from([(1, 0.0), (2, 0.0)]);
        assert_eq!(normalize(&zeros, false)[&1], 0.0);
        assert_eq!(normalize(&zeros, true)[&2], 1.0);
        let raw = HashMap::from([(1, 2.0), (2, 8.0)]);
        assert_eq!(normalize(&raw, true)[&2], 0.25);
        assert_eq!(normalize(&raw, false)[&1], 0.25);
    }

    #[test]
    fn single_candidate_scores_one() {
        let only = [candidate(5, &[&[0, 2]])];
        assert_eq!(frequency_score(&only)[&5], 1.0);
        assert_eq!(location_score(&only)[&5], 1.0);
        assert_eq!(distance_score(&only)[&5], 1.0);
    }
}
