use hybrid_core::config::{TokenizerConfig, TokenizerSource, BENGALI};
use hybrid_core::tokenizer::{load_stopwords, TextTokenizer};
use hybrid_core::{fit_avg_len, Bm25, Bm25Params, SearchError, SparseEncoder};
use std::fs;
use tempfile::{tempdir, TempDir};

fn fixture() -> (TempDir, TokenizerConfig) {
    let dir = tempdir().unwrap();
    let stop = dir.path().join("stopwords");
    fs::create_dir_all(&stop).unwrap();
    fs::write(stop.join("english.txt"), "the\nand\n\nof\n").unwrap();
    fs::write(stop.join("bengali.txt"), "এবং\nও\n").unwrap();
    fs::write(dir.path().join("vocab.txt"), "rice\nfish\nচাল\nডাল\nbasmati\n").unwrap();
    let cfg = TokenizerConfig {
        source: TokenizerSource::Vocab { path: dir.path().join("vocab.txt") },
        version: "vocab-test-1".into(),
        stopwords_dir: stop,
        languages: vec!["english".into(), "bengali".into()],
        preserve_ranges: vec![BENGALI],
    };
    (dir, cfg)
}

#[test]
fn it_unions_stopwords_across_languages() {
    let (_dir, cfg) = fixture();
    let words = load_stopwords(&cfg.stopwords_dir, &cfg.languages).unwrap();
    assert_eq!(words.len(), 5);
    assert!(words.contains("the"));
    assert!(words.contains("এবং"));
}

#[test]
fn it_fails_on_missing_stopword_file() {
    let (_dir, cfg) = fixture();
    let err = load_stopwords(&cfg.stopwords_dir, &["klingon".to_string()]).unwrap_err();
    assert!(matches!(err, SearchError::Configuration(_)));
}

#[test]
fn it_normalizes_mixed_scripts() {
    let (_dir, cfg) = fixture();
    let tok = TextTokenizer::from_config(&cfg).unwrap();
    assert_eq!(tok.normalizer().clean("The RICE, and চাল এবং ডাল!"), "rice চাল ডাল");
    assert_eq!(tok.tokenize("The RICE, and চাল এবং ডাল!").unwrap(), vec![0, 2, 3]);
    assert_eq!(tok.version(), "vocab-test-1");
}

#[test]
fn it_scores_stopword_only_text_as_empty() {
    let (_dir, cfg) = fixture();
    let tok = TextTokenizer::from_config(&cfg).unwrap();
    let enc = SparseEncoder::new(tok, Bm25::new(Bm25Params::default()).unwrap());
    assert!(enc.embed("the, and ... of").unwrap().is_empty());
    assert!(enc.embed("").unwrap().is_empty());
}

#[test]
fn it_fits_average_length() {
    let (_dir, cfg) = fixture();
    let tok = TextTokenizer::from_config(&cfg).unwrap();
    // 3 ids, 1 id, 2 ids
    let avg = fit_avg_len(&tok, ["rice fish rice", "the basmati", "চাল ডাল"]).unwrap();
    assert!((avg - 2.0).abs() < 1e-6);
}

#[test]
fn it_rejects_fitting_an_empty_corpus() {
    let (_dir, cfg) = fixture();
    let tok = TextTokenizer::from_config(&cfg).unwrap();
    assert!(matches!(fit_avg_len(&tok, Vec::<&str>::new()), Err(SearchError::Configuration(_))));
    assert!(matches!(fit_avg_len(&tok, ["the and"]), Err(SearchError::Configuration(_))));
}

#[test]
fn it_weighs_repeated_terms_higher() {
    let (_dir, cfg) = fixture();
    let tok = TextTokenizer::from_config(&cfg).unwrap();
    let enc = SparseEncoder::new(tok, Bm25::new(Bm25Params { k: 1.2, b: 0.75, avg_len: 3.0 }).unwrap());
    let v = enc.embed("rice rice fish").unwrap();
    assert_eq!(v.len(), 2);
    assert!(v.get(0).unwrap() > v.get(1).unwrap());
}
