use serde::{Deserialize, Serialize};
use std::fmt;

pub type TokenId = u32;

/// Arbitrary JSON attributes stored alongside a point in the vector index.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Point identifier as the vector index reports it: either an unsigned
/// integer or a UUID string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PointId {
    fn from(n: u64) -> Self { PointId::Num(n) }
}

impl From<&str> for PointId {
    fn from(s: &str) -> Self { PointId::Uuid(s.to_string()) }
}

/// One raw hit returned by the vector index. The scale of `score` depends on
/// which vector field was queried, so scores from different queries are not
/// comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Payload,
}

/// A hit that survived deduplication, thresholding and the result limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub id: PointId,
    pub score: f32,
    pub payload: Payload,
}

impl From<ScoredPoint> for RetrievalHit {
    fn from(p: ScoredPoint) -> Self {
        Self { id: p.id, score: p.score, payload: p.payload }
    }
}
