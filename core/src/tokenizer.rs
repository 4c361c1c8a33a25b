use crate::config::{CharRange, TokenizerConfig, TokenizerSource, BENGALI};
use crate::error::SearchError;
use crate::types::TokenId;
use anyhow::anyhow;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

lazy_static! {
    static ref PUNCT: Regex = punctuation_regex(&[BENGALI]).expect("valid regex");
}

/// Matches every character that is neither a word character, whitespace,
/// nor inside one of the preserved ranges.
fn punctuation_regex(preserve: &[CharRange]) -> Result<Regex, regex::Error> {
    let mut class = String::from(r"[^\w\s");
    for r in preserve {
        class.push_str(&format!(r"\x{{{:04X}}}-\x{{{:04X}}}", r.start as u32, r.end as u32));
    }
    class.push(']');
    Regex::new(&class)
}

/// Load `{dir}/{language}.txt` for every language and union the entries.
pub fn load_stopwords<P: AsRef<Path>>(dir: P, languages: &[String]) -> Result<HashSet<String>, SearchError> {
    let dir = dir.as_ref();
    let mut words = HashSet::new();
    for language in languages {
        let path = dir.join(format!("{language}.txt"));
        let text = std::fs::read_to_string(&path)
            .map_err(|e| SearchError::config(format!("stopwords {}: {e}", path.display())))?;
        words.extend(
            text.lines()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase),
        );
    }
    tracing::info!(languages = ?languages, count = words.len(), "loaded stopwords");
    Ok(words)
}

/// Punctuation stripping, lowercasing and stopword removal. Indexing and
/// querying must go through the same instance configuration.
#[derive(Debug, Clone)]
pub struct Normalizer {
    punct: Regex,
    stopwords: HashSet<String>,
}

impl Normalizer {
    /// Normalizer that preserves the Bengali block.
    pub fn new(stopwords: HashSet<String>) -> Self {
        Self { punct: PUNCT.clone(), stopwords }
    }

    pub fn with_preserved(stopwords: HashSet<String>, preserve: &[CharRange]) -> Result<Self, SearchError> {
        let punct = punctuation_regex(preserve).map_err(|e| SearchError::config(e.to_string()))?;
        Ok(Self { punct, stopwords })
    }

    pub fn from_config(cfg: &TokenizerConfig) -> Result<Self, SearchError> {
        let stopwords = load_stopwords(&cfg.stopwords_dir, &cfg.languages)?;
        Self::with_preserved(stopwords, &cfg.preserve_ranges)
    }

    fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// Surface tokens surviving punctuation and stopword removal, in order.
    pub fn surface_tokens(&self, text: &str) -> Vec<String> {
        let stripped = self.punct.replace_all(text, "");
        stripped
            .to_lowercase()
            .split_whitespace()
            .filter(|t| !self.is_stopword(t))
            .map(str::to_string)
            .collect()
    }

    /// Cleaned text handed to the token encoder: surviving tokens joined by
    /// single spaces.
    pub fn clean(&self, text: &str) -> String {
        self.surface_tokens(text).join(" ")
    }
}

/// Maps cleaned text to vocabulary ids. The mapping must be identical at
/// indexing and query time, hence the pinned `version`.
pub trait TokenEncoder: Send + Sync {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<TokenId>>;
    fn version(&self) -> &str;
}

/// Subword encoder backed by a serialized Hugging Face `tokenizer.json`.
pub struct SubwordEncoder {
    inner: tokenizers::Tokenizer,
    version: String,
}

impl SubwordEncoder {
    pub fn from_file<P: AsRef<Path>>(path: P, version: impl Into<String>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| SearchError::config(format!("tokenizer {}: {e}", path.display())))?;
        Ok(Self { inner, version: version.into() })
    }
}

impl TokenEncoder for SubwordEncoder {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<TokenId>> {
        let encoding = self.inner.encode(text, false).map_err(|e| anyhow!("encoding failed: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn version(&self) -> &str { &self.version }
}

/// Word-level vocabulary. Words outside the vocabulary are dropped.
#[derive(Debug, Clone)]
pub struct FixedVocab {
    ids: HashMap<String, TokenId>,
    version: String,
}

impl FixedVocab {
    /// A word's id is its position in `words`. A repeated word keeps its first
    /// id, and its later positions stay unused.
    pub fn from_words<I, S>(words: I, version: impl Into<String>) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids = HashMap::new();
        for (position, word) in words.into_iter().enumerate() {
            let id = TokenId::try_from(position)
                .map_err(|_| SearchError::config(format!("vocabulary exceeds {} entries", TokenId::MAX)))?;
            ids.entry(word.into()).or_insert(id);
        }
        Ok(Self { ids, version: version.into() })
    }

    /// One word per line; the id is the line's position among non-blank lines.
    pub fn from_file<P: AsRef<Path>>(path: P, version: impl Into<String>) -> Result<Self, SearchError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SearchError::config(format!("vocab {}: {e}", path.display())))?;
        Self::from_words(text.lines().map(str::trim).filter(|w| !w.is_empty()), version)
    }

    pub fn id(&self, word: &str) -> Option<TokenId> { self.ids.get(word).copied() }
}

impl TokenEncoder for FixedVocab {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<TokenId>> {
        Ok(text.split_whitespace().filter_map(|w| self.id(w)).collect())
    }

    fn version(&self) -> &str { &self.version }
}

/// Full text-to-ids pipeline: normalize, then encode.
#[derive(Clone)]
pub struct TextTokenizer {
    normalizer: Normalizer,
    encoder: Arc<dyn TokenEncoder>,
}

impl TextTokenizer {
    pub fn new(normalizer: Normalizer, encoder: Arc<dyn TokenEncoder>) -> Self {
        Self { normalizer, encoder }
    }

    pub fn from_config(cfg: &TokenizerConfig) -> Result<Self, SearchError> {
        let normalizer = Normalizer::from_config(cfg)?;
        let encoder: Arc<dyn TokenEncoder> = match &cfg.source {
            TokenizerSource::HuggingFace { path } => Arc::new(SubwordEncoder::from_file(path, cfg.version.clone())?),
            TokenizerSource::Vocab { path } => Arc::new(FixedVocab::from_file(path, cfg.version.clone())?),
        };
        Ok(Self::new(normalizer, encoder))
    }

    pub fn version(&self) -> &str { self.encoder.version() }

    pub fn normalizer(&self) -> &Normalizer { &self.normalizer }

    pub fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, SearchError> {
        let cleaned = self.normalizer.clean(text);
        if cleaned.is_empty() {
            return Ok(Vec::new());
        }
        self.encoder
            .encode(&cleaned)
            .map_err(|e| SearchError::Tokenizer(e.to_string()))
    }
}
