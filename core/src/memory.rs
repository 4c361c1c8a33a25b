//! In-process [`VectorIndex`] over a small point set. Brute force: cosine
//! similarity for dense queries and inner product for sparse ones.

use crate::backend::{IndexQuery, QueryVector, VectorIndex};
use crate::bm25::SparseVector;
use crate::types::{Payload, PointId, ScoredPoint};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct IndexedPoint {
    pub id: PointId,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: Payload,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    dimensions: Option<usize>,
    points: RwLock<Vec<IndexedPoint>>,
}

impl MemoryIndex {
    pub fn new() -> Self { Self::default() }

    /// Index that rejects dense vectors of any other length.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions: Some(dimensions), points: RwLock::new(Vec::new()) }
    }

    /// Insert or replace the point with the same id.
    pub fn upsert(&self, point: IndexedPoint) -> Result<()> {
        if let Some(dim) = self.dimensions {
            if point.dense.len() != dim {
                bail!("point {} has {} dimensions, index expects {dim}", point.id, point.dense.len());
            }
        }
        let mut points = self.points.write();
        match points.iter_mut().find(|p| p.id == point.id) {
            Some(existing) => *existing = point,
            None => points.push(point),
        }
        Ok(())
    }

    pub fn len(&self) -> usize { self.points.read().len() }

    pub fn is_empty(&self) -> bool { self.points.read().is_empty() }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query(&self, query: &IndexQuery) -> Result<Vec<ScoredPoint>> {
        if let (QueryVector::Dense(v), Some(dim)) = (&query.vector, self.dimensions) {
            if v.len() != dim {
                bail!("query has {} dimensions, index expects {dim}", v.len());
            }
        }
        let points = self.points.read();
        let mut scored: Vec<(usize, f32)> = points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match &query.vector {
                QueryVector::Dense(v) => Some((i, cosine(v, &p.dense))),
                // points sharing no token with the query are not candidates
                QueryVector::Sparse(v) => {
                    let s = v.dot(&p.sparse);
                    (s > 0.0).then_some((i, s))
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.limit);

        Ok(scored
            .into_iter()
            .map(|(i, score)| {
                let p = &points[i];
                ScoredPoint {
                    id: p.id.clone(),
                    score,
                    payload: if query.with_payload { p.payload.clone() } else { Payload::new() },
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: u64, dense: Vec<f32>, sparse: SparseVector, name: &str) -> IndexedPoint {
        let mut payload = Payload::new();
        payload.insert("name".into(), json!(name));
        IndexedPoint { id: PointId::Num(id), dense, sparse, payload }
    }

    fn sv(pairs: &[(u32, f32)]) -> SparseVector {
        SparseVector {
            indices: pairs.iter().map(|p| p.0).collect(),
            values: pairs.iter().map(|p| p.1).collect(),
        }
    }

    #[tokio::test]
    async fn dense_query_orders_by_cosine() {
        let idx = MemoryIndex::with_dimensions(2);
        idx.upsert(point(1, vec![1.0, 0.0], sv(&[]), "a")).unwrap();
        idx.upsert(point(2, vec![0.6, 0.8], sv(&[]), "b")).unwrap();
        let q = IndexQuery { vector: QueryVector::Dense(vec![0.0, 1.0]), limit: 10, with_payload: true };
        let hits = idx.query(&q).await.unwrap();
        assert_eq!(hits[0].id, PointId::Num(2));
        assert!((hits[0].score - 0.8).abs() < 1e-6);
        assert_eq!(hits[0].payload["name"], json!("b"));
    }

    #[tokio::test]
    async fn sparse_query_skips_non_overlapping_points() {
        let idx = MemoryIndex::new();
        idx.upsert(point(1, vec![], sv(&[(3, 1.0)]), "a")).unwrap();
        idx.upsert(point(2, vec![], sv(&[(4, 1.0)]), "b")).unwrap();
        let q = IndexQuery { vector: QueryVector::Sparse(sv(&[(4, 0.5)])), limit: 10, with_payload: false };
        let hits = idx.query(&q).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, PointId::Num(2));
        assert!(hits[0].payload.is_empty());
    }

    #[test]
    fn upsert_replaces_and_checks_dimensions() {
        let idx = MemoryIndex::with_dimensions(2);
        idx.upsert(point(1, vec![1.0, 0.0], sv(&[]), "a")).unwrap();
        idx.upsert(point(1, vec![0.0, 1.0], sv(&[]), "a2")).unwrap();
        assert_eq!(idx.len(), 1);
        assert!(idx.upsert(point(2, vec![1.0], sv(&[]), "c")).is_err());
    }
}
