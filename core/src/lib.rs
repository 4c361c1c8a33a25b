pub mod backend;
pub mod bm25;
pub mod cache;
pub mod config;
pub mod error;
pub mod fusion;
pub mod http;
pub mod memory;
pub mod persist;
pub mod retrieval;
pub mod service;
pub mod tokenizer;
pub mod types;

pub use backend::{DenseEncoder, IndexQuery, QueryVector, VectorIndex};
pub use bm25::{fit_avg_len, Bm25, SparseEncoder, SparseVector};
pub use cache::{CacheKey, CacheStats, ResultCache, TtlCache};
pub use config::{Bm25Params, SearchConfig};
pub use error::{BackendStage, CacheError, SearchError};
pub use memory::MemoryIndex;
pub use retrieval::{HybridRetriever, Mode};
pub use service::{SearchOutcome, SearchService};
pub use tokenizer::{FixedVocab, Normalizer, SubwordEncoder, TextTokenizer, TokenEncoder};
pub use types::{Payload, PointId, RetrievalHit, ScoredPoint, TokenId};
