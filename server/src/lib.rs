use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use linkdex_core::pagerank::{compute_page_rank, PageRankConfig, PageRankSummary};
use linkdex_core::query::{ScoreWeights, Searcher, DEFAULT_LIMIT};
use linkdex_core::{IndexStore, StoreError, StoreStats, UrlId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    /// Weight of the PageRank signal; off unless given.
    #[serde(default)]
    pub pr: f64,
}
fn default_k() -> usize { DEFAULT_LIMIT }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub url_id: UrlId,
    pub url: String,
    pub score: f64,
}

#[derive(Serialize)]
pub struct PageResponse {
    pub url_id: UrlId,
    pub url: String,
    pub indexed: bool,
    pub page_rank: Option<f64>,
    pub out_degree: usize,
    pub linked_from: Vec<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub store: IndexStore,
    pub admin_token: Option<String>,
    /// Held while PageRank is being recomputed.
    pub ranking: Arc<Mutex<()>>,
}

type ApiError = (StatusCode, String);

pub fn build_app_with_store(store: IndexStore, admin_token: Option<String>) -> Router {
    let app_state = AppState { store, admin_token, ranking: Arc::new(Mutex::new(())) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/page/:url_id", get(page_handler))
        .route("/stats", get(stats_handler))
        .route("/admin/rank", post(rank_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, 100);
    let weights = ScoreWeights { page_rank: params.pr, ..Default::default() };
    let found = Searcher::new(&state.store).with_weights(weights).search(&params.q, k).map_err(internal)?;
    let results = found
        .hits
        .into_iter()
        .map(|h| SearchHit { url_id: h.url_id, url: h.url, score: h.score })
        .collect();
    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, hits = found.total_hits, "search");
    Ok(Json(SearchResponse { query: params.q, took_s: elapsed.as_secs_f64(), total_hits: found.total_hits, results }))
}

pub async fn page_handler(State(state): State<AppState>, Path(url_id): Path<UrlId>) -> Result<Json<PageResponse>, ApiError> {
    let store = &state.store;
    let url = store.url(url_id).map_err(internal)?.ok_or((StatusCode::NOT_FOUND, "not found".to_string()))?;
    let mut linked_from = Vec::new();
    for from in store.links_into(url_id).map_err(internal)? {
        if let Some(u) = store.url(from).map_err(internal)? {
            linked_from.push(u);
        }
    }
    Ok(Json(PageResponse {
        url_id,
        url,
        indexed: store.is_indexed_id(url_id).map_err(internal)?,
        page_rank: store.page_rank(url_id).map_err(internal)?,
        out_degree: store.out_degree(url_id).map_err(internal)?,
        linked_from,
    }))
}

pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StoreStats>, ApiError> {
    state.store.stats().map(Json).map_err(internal)
}

// --- Admin endpoints ---
async fn rank_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<PageRankSummary>, ApiError> {
    authorize(&state, &headers)?;
    let store = state.store.clone();
    let ranking = Arc::clone(&state.ranking);
    // the lock is taken on the blocking thread; its guard cannot cross an await
    let ranked = tokio::task::spawn_blocking(move || {
        let _guard = ranking.try_lock()?;
        Some(compute_page_rank(&store, &PageRankConfig::default()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    match ranked {
        Some(summary) => summary.map(Json).map_err(internal),
        None => Err((StatusCode::CONFLICT, "page rank already running".into())),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn internal(e: StoreError) -> ApiError {
    tracing::error!(error = %e, "store error");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
