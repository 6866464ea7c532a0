use crate::error::StoreError;
use crate::index::{LinkRow, UrlId};
use crate::store::IndexStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRankConfig {
    pub damping: f64,
    pub baseline: f64,
    pub iterations: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self { damping: 0.85, baseline: 0.15, iterations: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRankSummary {
    pub pages: usize,
    pub links: usize,
    pub iterations: usize,
    pub total_score: f64,
}

/// Link graph over the indexed pages, held in memory for ranking.
#[derive(Debug, Default)]
pub struct LinkGraph {
    nodes: Vec<UrlId>,
    /// Distinct linkers of each node, as node indices.
    linkers: Vec<Vec<usize>>,
    /// Outgoing link rows of each node, including links to pages outside the graph.
    out_degree: Vec<usize>,
    links: usize,
}

impl LinkGraph {
    /// Read the whole graph from the store in one pass.
    pub fn load(store: &IndexStore) -> Result<Self, StoreError> {
        let nodes = store.indexed_url_ids()?;
        let links = store.links()?.into_iter().map(|(_, row)| row);
        Ok(Self::from_links(nodes, links))
    }

    pub fn from_links(nodes: Vec<UrlId>, links: impl IntoIterator<Item = LinkRow>) -> Self {
        let index: HashMap<UrlId, usize> = nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut linkers = vec![Vec::new(); nodes.len()];
        let mut out_degree = vec![0; nodes.len()];
        let mut count = 0;
        for LinkRow { from, to } in links {
            count += 1;
            let Some(&v) = index.get(&from) else { continue };
            out_degree[v] += 1;
            if let Some(&u) = index.get(&to) {
                linkers[u].push(v);
            }
        }
        for l in linkers.iter_mut() {
            l.sort_unstable();
            l.dedup();
        }
        Self { nodes, linkers, out_degree, links: count }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run the fixed number of iterations and return one score per node.
    ///
    /// Every iteration reads only the previous iteration's scores, so the
    /// result does not depend on node order. A linker without outgoing links
    /// contributes nothing.
    pub fn rank(&self, config: &PageRankConfig) -> Vec<f64> {
        let mut prev = vec![1.0; self.nodes.len()];
        let mut next = vec![0.0; self.nodes.len()];
        for iteration in 0..config.iterations {
            for (u, linkers) in self.linkers.iter().enumerate() {
                let mut pr = config.baseline;
                for &v in linkers {
                    let degree = self.out_degree[v];
                    if degree > 0 {
                        pr += config.damping * prev[v] / degree as f64;
                    }
                }
                next[u] = pr;
            }
            std::mem::swap(&mut prev, &mut next);
            tracing::debug!(iteration, "page rank iteration");
        }
        prev
    }
}

/// Recompute PageRank for every indexed page and replace the stored scores.
pub fn compute_page_rank(store: &IndexStore, config: &PageRankConfig) -> Result<PageRankSummary, StoreError> {
    let graph = LinkGraph::load(store)?;
    let ranks = graph.rank(config);
    let total_score: f64 = ranks.iter().sum();
    let scores: HashMap<UrlId, f64> = graph.nodes.iter().copied().zip(ranks).collect();
    store.replace_page_rank(&scores)?;
    let summary = PageRankSummary { pages: graph.len(), links: graph.links, iterations: config.iterations, total_score };
    tracing::info!(pages = summary.pages, links = summary.links, iterations = summary.iterations, "page rank stored");
    Ok(summary)
}
