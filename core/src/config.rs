//! Configuration surface for the retrieval engine.
//!
//! Everything here is read once at startup and then shared read-only.
//! [`SearchConfig::load`] rejects invalid values so that no configuration
//! problem can surface at request time.

use crate::error::SearchError;
use crate::retrieval::Mode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub bm25: Bm25Params,
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

impl SearchConfig {
    /// Parse a JSON config file, apply environment overrides and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut config: SearchConfig = serde_json::from_str(&text)
            .map_err(|e| SearchError::config(format!("{}: {e}", path.display())))?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.index.url = url;
        }
        if let Ok(collection) = std::env::var("QDRANT_COLLECTION_NAME") {
            self.index.collection = collection;
        }
        if self.index.api_key.is_none() {
            self.index.api_key = std::env::var("QDRANT_API_KEY").ok();
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = std::env::var("EMBEDDING_API_KEY").ok();
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        self.bm25.validate()?;
        self.tokenizer.validate()?;
        self.retrieval.validate()?;
        self.cache.validate()?;
        if self.embedding.dimensions == 0 {
            return Err(SearchError::config("embedding.dimensions must be positive"));
        }
        Ok(())
    }
}

/// BM25 scorer parameters. Documents and queries must be scored with the
/// same values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k: f32,
    /// Length-normalization strength, 0 disables it.
    pub b: f32,
    /// Mean token count per corpus document.
    pub avg_len: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k: 1.2, b: 0.75, avg_len: 256.0 }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<(), SearchError> {
        if !self.avg_len.is_finite() || self.avg_len <= 0.0 {
            return Err(SearchError::config(format!("bm25.avg_len must be positive, got {}", self.avg_len)));
        }
        if !self.k.is_finite() || self.k < 0.0 {
            return Err(SearchError::config(format!("bm25.k must be non-negative, got {}", self.k)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(SearchError::config(format!("bm25.b must lie in [0, 1], got {}", self.b)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TokenizerSource {
    /// Serialized `tokenizer.json`.
    HuggingFace { path: PathBuf },
    /// Newline-delimited word list; a word's id is its line number.
    Vocab { path: PathBuf },
}

/// Inclusive range of code points that punctuation stripping must keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharRange {
    pub start: char,
    pub end: char,
}

/// The Bengali block.
pub const BENGALI: CharRange = CharRange { start: '\u{0980}', end: '\u{09FF}' };

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub source: TokenizerSource,
    /// Pinned tokenizer identity. Persisted corpus statistics record it and
    /// refuse to load under a different one.
    pub version: String,
    pub stopwords_dir: PathBuf,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_preserve_ranges")]
    pub preserve_ranges: Vec<CharRange>,
}

fn default_languages() -> Vec<String> {
    vec!["english".to_string(), "bengali".to_string()]
}

fn default_preserve_ranges() -> Vec<CharRange> {
    vec![BENGALI]
}

impl TokenizerConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.version.trim().is_empty() {
            return Err(SearchError::config("tokenizer.version must be pinned"));
        }
        if let Some(r) = self.preserve_ranges.iter().find(|r| r.start > r.end) {
            return Err(SearchError::config(format!("tokenizer.preserve_ranges: {:?} > {:?}", r.start, r.end)));
        }
        Ok(())
    }
}

/// Minimum score per mode. Scores are not comparable across modes, so each
/// mode carries its own threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreThresholds {
    pub dense: f32,
    pub sparse: f32,
    pub hybrid: f32,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self { dense: 0.4, sparse: 0.4, hybrid: 0.0 }
    }
}

impl ScoreThresholds {
    pub fn for_mode(&self, mode: Mode) -> f32 {
        match mode {
            Mode::Dense => self.dense,
            Mode::Sparse => self.sparse,
            Mode::Hybrid => self.hybrid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub min_limit: usize,
    pub max_limit: usize,
    /// Hits fetched for single-modality queries, leaving room for dedup loss.
    pub candidate_limit: usize,
    /// Hits fetched per modality before fusion in hybrid mode.
    pub prefetch_limit: usize,
    pub rrf_k: u32,
    /// Payload field used to collapse hits describing the same item.
    pub dedup_field: String,
    pub thresholds: ScoreThresholds,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_limit: 5,
            max_limit: 20,
            candidate_limit: 30,
            prefetch_limit: 10,
            rrf_k: 60,
            dedup_field: "name".to_string(),
            thresholds: ScoreThresholds::default(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.min_limit == 0 || self.min_limit > self.max_limit {
            return Err(SearchError::config(format!(
                "retrieval limits must satisfy 0 < min <= max, got [{}, {}]",
                self.min_limit, self.max_limit
            )));
        }
        if self.candidate_limit < self.max_limit {
            return Err(SearchError::config("retrieval.candidate_limit must be at least max_limit"));
        }
        if self.prefetch_limit == 0 {
            return Err(SearchError::config("retrieval.prefetch_limit must be positive"));
        }
        let t = &self.thresholds;
        if ![t.dense, t.sparse, t.hybrid].iter().all(|v| v.is_finite()) {
            return Err(SearchError::config("retrieval.thresholds must be finite"));
        }
        Ok(())
    }

    /// Clamp a requested limit into `[min_limit, max_limit]`.
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.clamp(self.min_limit, self.max_limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, ttl_secs: 300, capacity: 1024 }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.enabled && self.capacity == 0 {
            return Err(SearchError::config("cache.capacity must be positive when the cache is enabled"));
        }
        Ok(())
    }
}

/// OpenAI-compatible embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081/v1/embeddings".to_string(),
            model: "all-mpnet-base-v2".to_string(),
            dimensions: 768,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

/// Qdrant collection holding one dense and one sparse named vector per point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub url: String,
    pub collection: String,
    pub dense_field: String,
    pub sparse_field: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "products".to_string(),
            dense_field: "dense_vector".to_string(),
            sparse_field: "sparse_vector".to_string(),
            timeout_secs: 600,
            api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_json() -> &'static str {
        r#"{
            "tokenizer": {
                "source": { "kind": "vocab", "path": "vocab.txt" },
                "version": "vocab-v1",
                "stopwords_dir": "stopwords"
            }
        }"#
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg: SearchConfig = serde_json::from_str(minimal_json()).unwrap();
        assert_eq!(cfg.bm25, Bm25Params::default());
        assert_eq!(cfg.retrieval.min_limit, 5);
        assert_eq!(cfg.retrieval.max_limit, 20);
        assert_eq!(cfg.retrieval.rrf_k, 60);
        assert_eq!(cfg.tokenizer.languages, vec!["english", "bengali"]);
        assert_eq!(cfg.tokenizer.preserve_ranges, vec![BENGALI]);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_non_positive_avg_len() {
        let mut cfg: SearchConfig = serde_json::from_str(minimal_json()).unwrap();
        cfg.bm25.avg_len = 0.0;
        assert!(matches!(cfg.validate(), Err(SearchError::Configuration(_))));
        cfg.bm25.avg_len = -3.0;
        assert!(matches!(cfg.validate(), Err(SearchError::Configuration(_))));
    }

    #[test]
    fn rejects_inverted_limits() {
        let mut cfg = RetrievalConfig::default();
        cfg.min_limit = 30;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn clamps_limit_into_bounds() {
        let cfg = RetrievalConfig::default();
        assert_eq!(cfg.clamp_limit(0), 5);
        assert_eq!(cfg.clamp_limit(3), 5);
        assert_eq!(cfg.clamp_limit(12), 12);
        assert_eq!(cfg.clamp_limit(100), 20);
    }

    #[test]
    fn thresholds_are_per_mode() {
        let t = ScoreThresholds::default();
        assert_eq!(t.for_mode(Mode::Dense), 0.4);
        assert_eq!(t.for_mode(Mode::Hybrid), 0.0);
    }
}
