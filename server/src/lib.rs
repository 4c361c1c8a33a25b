use anyhow::Result;
use axum::{extract::{Query, State}, http::StatusCode, response::{IntoResponse, Response}, routing::get, Json, Router};
use hybrid_core::http::{HttpEncoder, QdrantIndex};
use hybrid_core::persist::{load_stats, IndexPaths};
use hybrid_core::{
    Bm25, CacheStats, HybridRetriever, ResultCache, RetrievalHit, SearchConfig, SearchError, SearchService,
    SparseEncoder, TextTokenizer, TtlCache,
};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct ProductParams {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_query_type")]
    pub query_type: String,
    /// Signed so that out-of-range requests reach the clamp instead of
    /// failing extraction.
    #[serde(default = "default_limit")]
    pub limit: i64,
}
fn default_query_type() -> String { "dense".to_string() }
fn default_limit() -> i64 { 5 }

#[derive(Serialize)]
pub struct ProductResponse {
    pub query: String,
    pub query_type: String,
    pub took_s: f64,
    pub cached: bool,
    pub total_hits: usize,
    pub results: Vec<RetrievalHit>,
}

#[derive(Serialize)]
pub struct CacheStatsResponse {
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: CacheStats,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
}

/// Maps a [`SearchError`] to an HTTP status and a JSON error body.
pub struct ApiError(SearchError);

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self { ApiError(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if matches!(self.0, SearchError::Backend { .. }) {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "search failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Wire the search service from a config file: HTTP embedding encoder,
/// Qdrant index, TTL cache, and optionally fitted corpus statistics.
pub fn build_state(config_path: &str, stats_dir: Option<&str>) -> Result<AppState> {
    let mut config = SearchConfig::load(config_path)?;
    if let Some(dir) = stats_dir {
        let stats = load_stats(&IndexPaths::new(dir))?;
        stats.apply(&mut config)?;
        tracing::info!(dir, num_docs = stats.num_docs, avg_len = stats.avg_len, "corpus stats loaded");
    }

    let sparse = SparseEncoder::new(TextTokenizer::from_config(&config.tokenizer)?, Bm25::new(config.bm25)?);
    let dense = Arc::new(HttpEncoder::new(config.embedding.clone())?);
    let index = Arc::new(QdrantIndex::new(config.index.clone())?);
    let retriever = HybridRetriever::new(sparse, dense, index, config.retrieval.clone())?;

    let ttl = Duration::from_secs(config.cache.ttl_secs);
    let cache: Option<Arc<dyn ResultCache>> = match NonZeroUsize::new(config.cache.capacity) {
        Some(capacity) if config.cache.enabled => Some(Arc::new(TtlCache::new(capacity, ttl))),
        _ => None,
    };
    Ok(AppState { service: Arc::new(SearchService::new(retriever, cache, ttl)) })
}

pub fn build_app(state: AppState) -> Router {
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
        .route("/products", get(products_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn products_handler(
    State(state): State<AppState>,
    Query(params): Query<ProductParams>,
) -> Result<Json<ProductResponse>, ApiError> {
    let start = std::time::Instant::now();
    // negative limits clamp up like zero
    let limit = usize::try_from(params.limit).unwrap_or(0);
    let outcome = state.service.search(&params.query, &params.query_type, limit).await?;
    let results: Vec<RetrievalHit> = outcome.hits.as_ref().clone();
    let elapsed = start.elapsed();
    tracing::info!(
        query = %params.query,
        mode = %outcome.mode,
        limit = outcome.limit,
        hits = results.len(),
        cached = outcome.cached,
        took_s = elapsed.as_secs_f64(),
        "products search"
    );
    Ok(Json(ProductResponse {
        query: params.query,
        query_type: outcome.mode.to_string(),
        took_s: elapsed.as_secs_f64(),
        cached: outcome.cached,
        total_hits: results.len(),
        results,
    }))
}

pub async fn cache_stats_handler(State(state): State<AppState>) -> Response {
    let Some(cache) = state.service.cache() else {
        return Json(CacheStatsResponse { enabled: false, stats: CacheStats::default() }).into_response();
    };
    match cache.stats() {
        Ok(stats) => Json(CacheStatsResponse { enabled: true, stats }).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "cache stats unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
