use crate::cache::{CacheKey, CachedHits, ResultCache};
use crate::error::SearchError;
use crate::retrieval::{HybridRetriever, Mode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a [`SearchService::search`] call.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub mode: Mode,
    pub limit: usize,
    pub hits: CachedHits,
    pub cached: bool,
}

/// Request-level entry point: validates input, consults the result cache,
/// runs the retriever on a miss and caches successful results only.
pub struct SearchService {
    retriever: HybridRetriever,
    cache: Option<Arc<dyn ResultCache>>,
    ttl: Duration,
}

impl SearchService {
    pub fn new(retriever: HybridRetriever, cache: Option<Arc<dyn ResultCache>>, ttl: Duration) -> Self {
        Self { retriever, cache, ttl }
    }

    pub fn cache(&self) -> Option<&Arc<dyn ResultCache>> { self.cache.as_ref() }

    /// Invalid mode and empty query are rejected before the cache or any
    /// backend is touched. The cache write happens after retrieval completes,
    /// so a request dropped mid-flight leaves the cache untouched.
    pub async fn search(&self, query: &str, mode: &str, limit: usize) -> Result<SearchOutcome, SearchError> {
        let mode: Mode = mode.parse()?;
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let limit = self.retriever.config().clamp_limit(limit);
        let key = CacheKey::new(query, mode, limit);

        if let Some(cache) = &self.cache {
            match cache.get(&key) {
                Ok(Some(hits)) => {
                    debug!(query = %key.query, %mode, limit, "cache hit");
                    return Ok(SearchOutcome { mode, limit, hits, cached: true });
                }
                Ok(None) => debug!(query = %key.query, %mode, limit, "cache miss"),
                Err(e) => warn!(error = %e, "cache read failed, treating as miss"),
            }
        }

        let hits: CachedHits = Arc::new(self.retriever.retrieve(query, mode, limit).await?);

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(key, Arc::clone(&hits), self.ttl) {
                warn!(error = %e, "cache write failed");
            }
        }
        Ok(SearchOutcome { mode, limit, hits, cached: false })
    }
}
