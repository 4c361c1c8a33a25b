//! Contracts for the two external collaborators: the dense text encoder and
//! the vector index. Both are the only places a retrieval may block on I/O.

use crate::bm25::SparseVector;
use crate::types::ScoredPoint;
use async_trait::async_trait;

/// Turns text into a fixed-dimension embedding. Must be deterministic for a
/// pinned model.
#[async_trait]
pub trait DenseEncoder: Send + Sync {
    async fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn dimensions(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    Dense(Vec<f32>),
    Sparse(SparseVector),
}

impl QueryVector {
    /// Which named vector field of the index the query targets.
    pub fn field(&self) -> &'static str {
        match self {
            QueryVector::Dense(_) => "dense",
            QueryVector::Sparse(_) => "sparse",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub vector: QueryVector,
    pub limit: usize,
    pub with_payload: bool,
}

/// Similarity search over points holding a dense and a sparse vector.
/// Results come back ordered by descending score.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, query: &IndexQuery) -> anyhow::Result<Vec<ScoredPoint>>;
}
