//! Hybrid retrieval orchestration.
//!
//! A query is encoded into the vector(s) its [`Mode`] needs, sent to the
//! vector index (two concurrent prefetches fused with RRF in hybrid mode),
//! and the ranked hits are post-processed in a fixed order: deduplicate by
//! payload key, drop hits under the mode's score threshold, stop at the
//! limit.

use crate::backend::{DenseEncoder, IndexQuery, QueryVector, VectorIndex};
use crate::bm25::{SparseEncoder, SparseVector};
use crate::config::RetrievalConfig;
use crate::error::{BackendStage, SearchError};
use crate::fusion::reciprocal_rank_fusion;
use crate::types::{RetrievalHit, ScoredPoint};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Dense,
    Sparse,
    Hybrid,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dense => "dense",
            Mode::Sparse => "sparse",
            Mode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Mode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dense" => Ok(Mode::Dense),
            "sparse" => Ok(Mode::Sparse),
            "hybrid" => Ok(Mode::Hybrid),
            other => Err(SearchError::InvalidMode(other.to_string())),
        }
    }
}

pub struct HybridRetriever {
    sparse: SparseEncoder,
    dense: Arc<dyn DenseEncoder>,
    index: Arc<dyn VectorIndex>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        sparse: SparseEncoder,
        dense: Arc<dyn DenseEncoder>,
        index: Arc<dyn VectorIndex>,
        config: RetrievalConfig,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self { sparse, dense, index, config })
    }

    pub fn config(&self) -> &RetrievalConfig { &self.config }

    /// Ranked, deduplicated hits for `query`. `limit` is clamped into the
    /// configured bounds; fewer hits come back only when not enough unique
    /// hits clear the threshold.
    pub async fn retrieve(&self, query: &str, mode: Mode, limit: usize) -> Result<Vec<RetrievalHit>, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let limit = self.config.clamp_limit(limit);

        let candidates = self.config.candidate_limit;
        let ranked = match mode {
            Mode::Dense => {
                let dense = self.encode_dense(query).await?;
                self.search(QueryVector::Dense(dense), candidates).await?
            }
            Mode::Sparse => {
                let sparse = self.sparse.embed(query)?;
                self.search_sparse(sparse, candidates).await?
            }
            Mode::Hybrid => {
                let dense = self.encode_dense(query).await?;
                let sparse = self.sparse.embed(query)?;
                let prefetch = self.config.prefetch_limit;
                let (dense_hits, sparse_hits) = tokio::try_join!(
                    self.search(QueryVector::Dense(dense), prefetch),
                    self.search_sparse(sparse, prefetch)
                )?;
                debug!(dense = dense_hits.len(), sparse = sparse_hits.len(), "prefetched");
                reciprocal_rank_fusion(&[dense_hits, sparse_hits], self.config.rrf_k)
            }
        };

        let threshold = self.config.thresholds.for_mode(mode);
        let hits = postprocess(ranked, &self.config.dedup_field, threshold, limit);
        debug!(%mode, limit, returned = hits.len(), "retrieved");
        Ok(hits)
    }

    async fn encode_dense(&self, query: &str) -> Result<Vec<f32>, SearchError> {
        let vector = self
            .dense
            .encode(query)
            .await
            .map_err(|e| SearchError::backend(BackendStage::Encoder, e))?;
        let expected = self.dense.dimensions();
        if vector.len() != expected {
            return Err(SearchError::backend(
                BackendStage::Encoder,
                anyhow::anyhow!("encoder returned {} dimensions, expected {expected}", vector.len()),
            ));
        }
        Ok(vector)
    }

    /// A query made only of stopwords has nothing to match sparsely.
    async fn search_sparse(&self, vector: SparseVector, limit: usize) -> Result<Vec<ScoredPoint>, SearchError> {
        if vector.is_empty() {
            return Ok(Vec::new());
        }
        self.search(QueryVector::Sparse(vector), limit).await
    }

    async fn search(&self, vector: QueryVector, limit: usize) -> Result<Vec<ScoredPoint>, SearchError> {
        let field = vector.field();
        let request = IndexQuery { vector, limit, with_payload: true };
        let hits = self
            .index
            .query(&request)
            .await
            .map_err(|e| SearchError::backend(BackendStage::Index, e))?;
        debug!(field, requested = limit, hits = hits.len(), "index query");
        Ok(hits)
    }
}

/// Key used to collapse hits describing the same item: the payload field's
/// string value, its JSON text for non-string values, or the point id when
/// the field is missing.
fn dedup_key(point: &ScoredPoint, field: &str) -> String {
    match point.payload.get(field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => format!("id:{}", point.id),
    }
}

/// Dedup (first occurrence wins), then threshold, then limit.
pub fn postprocess(ranked: Vec<ScoredPoint>, dedup_field: &str, threshold: f32, limit: usize) -> Vec<RetrievalHit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(limit.min(ranked.len()));
    for point in ranked {
        if out.len() >= limit {
            break;
        }
        if !seen.insert(dedup_key(&point, dedup_field)) {
            continue;
        }
        // NaN never clears a threshold
        if point.score.is_nan() || point.score < threshold {
            continue;
        }
        out.push(RetrievalHit::from(point));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Payload, PointId};
    use serde_json::json;

    fn hit(id: u64, score: f32, name: &str) -> ScoredPoint {
        let mut payload = Payload::new();
        payload.insert("name".into(), json!(name));
        ScoredPoint { id: PointId::Num(id), score, payload }
    }

    #[test]
    fn parses_known_modes_only() {
        assert_eq!("dense".parse::<Mode>().unwrap(), Mode::Dense);
        assert_eq!("sparse".parse::<Mode>().unwrap(), Mode::Sparse);
        assert_eq!("hybrid".parse::<Mode>().unwrap(), Mode::Hybrid);
        assert!(matches!("bogus".parse::<Mode>(), Err(SearchError::InvalidMode(m)) if m == "bogus"));
        assert!("Dense".parse::<Mode>().is_err());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let ranked = vec![hit(1, 0.9, "rice"), hit(2, 0.95, "rice"), hit(3, 0.8, "fish")];
        let out = postprocess(ranked, "name", 0.0, 10);
        let ids: Vec<PointId> = out.into_iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![PointId::Num(1), PointId::Num(3)]);
    }

    #[test]
    fn dedup_runs_before_threshold() {
        // the first "rice" is below threshold; it still claims the key
        let ranked = vec![hit(1, 0.1, "rice"), hit(2, 0.9, "rice"), hit(3, 0.8, "fish")];
        let out = postprocess(ranked, "name", 0.4, 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, PointId::Num(3));
    }

    #[test]
    fn limit_caps_output() {
        let ranked: Vec<ScoredPoint> = (0..30).map(|i| hit(i, 1.0, &format!("item {i}"))).collect();
        assert_eq!(postprocess(ranked, "name", 0.4, 7).len(), 7);
    }

    #[test]
    fn nan_scores_never_pass_the_threshold() {
        let ranked = vec![hit(1, f32::NAN, "rice"), hit(2, 0.9, "fish")];
        let out = postprocess(ranked, "name", 0.4, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, PointId::Num(2));
        assert!(postprocess(vec![hit(3, f32::NAN, "oil")], "name", f32::NEG_INFINITY, 5).is_empty());
    }

    #[test]
    fn missing_key_falls_back_to_id() {
        let mut a = hit(1, 0.9, "x");
        a.payload.clear();
        let mut b = hit(2, 0.8, "x");
        b.payload.clear();
        assert_eq!(postprocess(vec![a, b], "name", 0.0, 10).len(), 2);
    }

    #[test]
    fn non_string_keys_compare_as_json() {
        let mut a = hit(1, 0.9, "");
        a.payload.insert("name".into(), json!(["Rice 1kg"]));
        let mut b = hit(2, 0.8, "");
        b.payload.insert("name".into(), json!(["Rice 1kg"]));
        assert_eq!(postprocess(vec![a, b], "name", 0.0, 10).len(), 1);
    }
}
