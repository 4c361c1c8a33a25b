//! BM25 sparse weighting.
//!
//! A text's sparse vector maps each distinct token id to
//!
//! ```text
//! tf * (k + 1) / (tf + k * (1 - b + b * doc_len / avg_len))
//! ```
//!
//! The same parameters must be used for documents at ingestion time and for
//! queries at request time.

use crate::config::Bm25Params;
use crate::error::SearchError;
use crate::tokenizer::TextTokenizer;
use crate::types::TokenId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token id to weight mapping, stored as parallel arrays with strictly
/// ascending indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<TokenId>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn len(&self) -> usize { self.indices.len() }

    pub fn is_empty(&self) -> bool { self.indices.is_empty() }

    pub fn get(&self, id: TokenId) -> Option<f32> {
        self.indices.binary_search(&id).ok().map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, f32)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Inner product over shared indices (merge walk).
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j, mut acc) = (0, 0, 0.0f32);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    acc += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        acc
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bm25 {
    params: Bm25Params,
}

impl Bm25 {
    pub fn new(params: Bm25Params) -> Result<Self, SearchError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> Bm25Params { self.params }

    /// One entry per distinct id in `token_ids`. An empty input yields an
    /// empty vector.
    pub fn score(&self, token_ids: &[TokenId]) -> SparseVector {
        let mut counts: BTreeMap<TokenId, u32> = BTreeMap::new();
        for &id in token_ids {
            *counts.entry(id).or_insert(0) += 1;
        }
        let Bm25Params { k, b, avg_len } = self.params;
        let doc_len = token_ids.len() as f32;
        let norm = k * (1.0 - b + b * doc_len / avg_len);
        let mut out = SparseVector {
            indices: Vec::with_capacity(counts.len()),
            values: Vec::with_capacity(counts.len()),
        };
        for (id, tf) in counts {
            let tf = tf as f32;
            out.indices.push(id);
            out.values.push(tf * (k + 1.0) / (tf + norm));
        }
        out
    }
}

/// Mean token count over a corpus. Run once at setup, never per query.
pub fn fit_avg_len<'a, I>(tokenizer: &TextTokenizer, documents: I) -> Result<f32, SearchError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = 0usize;
    let mut docs = 0usize;
    for doc in documents {
        total += tokenizer.tokenize(doc)?.len();
        docs += 1;
    }
    if docs == 0 {
        return Err(SearchError::config("cannot fit avg_len on an empty corpus"));
    }
    let avg_len = total as f32 / docs as f32;
    if avg_len <= 0.0 {
        return Err(SearchError::config("corpus produced no tokens, avg_len would be 0"));
    }
    tracing::info!(docs, total_tokens = total, avg_len, "fitted bm25 avg_len");
    Ok(avg_len)
}

/// Text to sparse vector: tokenize then score.
#[derive(Clone)]
pub struct SparseEncoder {
    tokenizer: TextTokenizer,
    bm25: Bm25,
}

impl SparseEncoder {
    pub fn new(tokenizer: TextTokenizer, bm25: Bm25) -> Self {
        Self { tokenizer, bm25 }
    }

    pub fn tokenizer(&self) -> &TextTokenizer { &self.tokenizer }

    pub fn bm25(&self) -> &Bm25 { &self.bm25 }

    pub fn embed(&self, text: &str) -> Result<SparseVector, SearchError> {
        let ids = self.tokenizer.tokenize(text)?;
        Ok(self.bm25.score(&ids))
    }

    pub fn embed_batch<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<SparseVector>, SearchError> {
        texts.iter().map(|t| self.embed(t.as_ref())).collect()
    }
}
