use crate::config::{Bm25Params, SearchConfig};
use crate::error::SearchError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const STATS_VERSION: u32 = 1;

/// Corpus statistics computed once by `indexer fit` and read at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub num_docs: u32,
    pub avg_len: f32,
    pub k: f32,
    pub b: f32,
    /// Tokenizer identity the statistics were computed with.
    pub tokenizer_version: String,
    pub created_at: String,
    pub version: u32,
}

impl CorpusStats {
    pub fn bm25(&self) -> Bm25Params {
        Bm25Params { k: self.k, b: self.b, avg_len: self.avg_len }
    }

    /// Adopt these statistics as the scorer parameters of `config`. Stats
    /// produced under a different tokenizer would silently corrupt scores,
    /// so a version mismatch is refused.
    pub fn apply(&self, config: &mut SearchConfig) -> Result<(), SearchError> {
        if self.tokenizer_version != config.tokenizer.version {
            return Err(SearchError::Configuration(format!(
                "corpus stats were computed with tokenizer {:?}, configured tokenizer is {:?}",
                self.tokenizer_version, config.tokenizer.version
            )));
        }
        if self.version != STATS_VERSION {
            return Err(SearchError::Configuration(format!("unsupported stats version {}", self.version)));
        }
        let params = self.bm25();
        params.validate()?;
        config.bm25 = params;
        Ok(())
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn stats(&self) -> PathBuf { self.root.join("stats.json") }
}

pub fn save_stats(paths: &IndexPaths, stats: &CorpusStats) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.stats())?;
    let json = serde_json::to_string_pretty(stats)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_stats(paths: &IndexPaths) -> Result<CorpusStats> {
    let mut f = File::open(paths.stats())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let stats: CorpusStats = serde_json::from_str(&buf)?;
    Ok(stats)
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TokenizerConfig, TokenizerSource};
    use tempfile::tempdir;

    fn config(version: &str) -> SearchConfig {
        SearchConfig {
            bm25: Bm25Params::default(),
            tokenizer: TokenizerConfig {
                source: TokenizerSource::Vocab { path: "vocab.txt".into() },
                version: version.into(),
                stopwords_dir: "stopwords".into(),
                languages: vec!["english".into()],
                preserve_ranges: vec![],
            },
            retrieval: Default::default(),
            cache: Default::default(),
            embedding: Default::default(),
            index: Default::default(),
        }
    }

    fn stats(version: &str) -> CorpusStats {
        CorpusStats {
            num_docs: 3,
            avg_len: 12.5,
            k: 1.2,
            b: 0.75,
            tokenizer_version: version.into(),
            created_at: now_rfc3339(),
            version: STATS_VERSION,
        }
    }

    #[test]
    fn stats_persist_and_apply() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        save_stats(&paths, &stats("vocab-v1")).unwrap();
        let loaded = load_stats(&paths).unwrap();
        assert_eq!(loaded, stats_with_time(&loaded));

        let mut cfg = config("vocab-v1");
        loaded.apply(&mut cfg).unwrap();
        assert_eq!(cfg.bm25.avg_len, 12.5);
    }

    fn stats_with_time(loaded: &CorpusStats) -> CorpusStats {
        CorpusStats { created_at: loaded.created_at.clone(), ..stats("vocab-v1") }
    }

    #[test]
    fn tokenizer_mismatch_is_rejected() {
        let mut cfg = config("vocab-v2");
        assert!(matches!(stats("vocab-v1").apply(&mut cfg), Err(SearchError::Configuration(_))));
    }
}
