//! HTTP clients for the external collaborators: an OpenAI-compatible
//! embedding endpoint and a Qdrant collection.

use crate::backend::{DenseEncoder, IndexQuery, QueryVector, VectorIndex};
use crate::config::{EmbeddingConfig, IndexConfig};
use crate::types::{Payload, PointId, ScoredPoint};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

pub struct HttpEncoder {
    client: Client,
    config: EmbeddingConfig,
}

impl HttpEncoder {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}")).context("invalid api key")?);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;
        tracing::info!(endpoint = %config.endpoint, model = %config.model, dimensions = config.dimensions, "http encoder ready");
        Ok(Self { client, config })
    }
}

#[async_trait]
impl DenseEncoder for HttpEncoder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest { model: &self.config.model, input: [text] };
        let response = self.client.post(&self.config.endpoint).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("embedding endpoint returned {status}: {body}");
        }
        let parsed: EmbeddingResponse = response.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("embedding endpoint returned no data"))
    }

    fn dimensions(&self) -> usize { self.config.dimensions }
}

#[derive(Deserialize)]
struct QueryResponse {
    result: QueryResult,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<WirePoint>,
}

#[derive(Deserialize)]
struct WirePoint {
    id: PointId,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

/// Qdrant collection queried through the universal query endpoint, one named
/// vector per modality.
pub struct QdrantIndex {
    client: Client,
    config: IndexConfig,
}

impl QdrantIndex {
    pub fn new(config: IndexConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert("api-key", HeaderValue::from_str(key).context("invalid qdrant api key")?);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;
        tracing::info!(url = %config.url, collection = %config.collection, "qdrant index ready");
        Ok(Self { client, config })
    }

    fn query_url(&self) -> String {
        format!("{}/collections/{}/points/query", self.config.url.trim_end_matches('/'), self.config.collection)
    }

    fn body(&self, query: &IndexQuery) -> serde_json::Value {
        let (vector, using) = match &query.vector {
            QueryVector::Dense(v) => (json!(v), &self.config.dense_field),
            QueryVector::Sparse(s) => (json!({ "indices": s.indices, "values": s.values }), &self.config.sparse_field),
        };
        json!({
            "query": vector,
            "using": using,
            "limit": query.limit,
            "with_payload": query.with_payload,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn query(&self, query: &IndexQuery) -> Result<Vec<ScoredPoint>> {
        let response = self.client.post(self.query_url()).json(&self.body(query)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("qdrant returned {status}: {body}");
        }
        let parsed: QueryResponse = response.json().await?;
        Ok(parsed
            .result
            .points
            .into_iter()
            .map(|p| ScoredPoint { id: p.id, score: p.score, payload: p.payload.unwrap_or_default() })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bm25::SparseVector;

    #[test]
    fn sparse_query_targets_sparse_field() {
        let idx = QdrantIndex::new(IndexConfig { url: "http://qdrant:6333/".into(), ..Default::default() }).unwrap();
        assert_eq!(idx.query_url(), "http://qdrant:6333/collections/products/points/query");
        let q = IndexQuery {
            vector: QueryVector::Sparse(SparseVector { indices: vec![3, 9], values: vec![0.5, 1.25] }),
            limit: 10,
            with_payload: true,
        };
        let body = idx.body(&q);
        assert_eq!(body["using"], "sparse_vector");
        assert_eq!(body["query"]["indices"], json!([3, 9]));
        assert_eq!(body["limit"], 10);
    }

    #[test]
    fn parses_query_response() {
        let raw = r#"{"result":{"points":[
            {"id":7,"version":1,"score":0.81,"payload":{"name":"Rice"}},
            {"id":"5c56c793-69f3-4fbf-87e6-c4bf54c28c26","version":1,"score":0.5}
        ]},"status":"ok","time":0.001}"#;
        let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.result.points[0].id, PointId::Num(7));
        assert!(parsed.result.points[1].payload.is_none());
    }
}
