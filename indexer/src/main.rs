use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hybrid_core::bm25::{fit_avg_len, Bm25, SparseEncoder, SparseVector};
use hybrid_core::persist::{load_stats, now_rfc3339, save_stats, CorpusStats, IndexPaths, STATS_VERSION};
use hybrid_core::tokenizer::TextTokenizer;
use hybrid_core::{Payload, PointId, SearchConfig};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Corpus calibration and BM25 sparse encoding for catalog documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the corpus average token length and persist corpus statistics
    Fit {
        /// Input path (file or directory of .json/.jsonl)
        #[arg(long)]
        input: String,
        /// Search config (JSON)
        #[arg(long)]
        config: String,
        /// Output directory for stats.json
        #[arg(long)]
        output: String,
        /// Payload fields whose text is scored
        #[arg(long, value_delimiter = ',', default_value = "name,description")]
        text_fields: Vec<String>,
    },
    /// Write one BM25 sparse vector per document as JSONL, ready to upsert
    Encode {
        #[arg(long)]
        input: String,
        #[arg(long)]
        config: String,
        /// Directory holding stats.json from `fit`
        #[arg(long)]
        stats: String,
        /// Output JSONL file
        #[arg(long)]
        output: String,
        #[arg(long, value_delimiter = ',', default_value = "name,description")]
        text_fields: Vec<String>,
    },
}

/// A catalog document: its point id, the full payload, and the text scored.
#[derive(Debug)]
struct Document {
    id: PointId,
    text: String,
    payload: Payload,
}

#[derive(Serialize)]
struct EncodedDoc<'a> {
    id: &'a PointId,
    sparse: &'a SparseVector,
    payload: &'a Payload,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Fit { input, config, output, text_fields } => fit(&input, &config, &output, &text_fields),
        Commands::Encode { input, config, stats, output, text_fields } => {
            encode(&input, &config, &stats, &output, &text_fields)
        }
    }
}

fn fit(input: &str, config: &str, output: &str, text_fields: &[String]) -> Result<()> {
    let config = SearchConfig::load(config)?;
    let tokenizer = TextTokenizer::from_config(&config.tokenizer)?;
    let docs = read_documents(Path::new(input), text_fields)?;
    let avg_len = fit_avg_len(&tokenizer, docs.iter().map(|d| d.text.as_str()))?;

    let num_docs = u32::try_from(docs.len()).context("corpus has more documents than stats.json can record")?;
    let stats = CorpusStats {
        num_docs,
        avg_len,
        k: config.bm25.k,
        b: config.bm25.b,
        tokenizer_version: tokenizer.version().to_string(),
        created_at: now_rfc3339(),
        version: STATS_VERSION,
    };
    save_stats(&IndexPaths::new(output), &stats)?;
    tracing::info!(output, num_docs = stats.num_docs, avg_len, "corpus stats written");
    Ok(())
}

fn encode(input: &str, config: &str, stats: &str, output: &str, text_fields: &[String]) -> Result<()> {
    let mut config = SearchConfig::load(config)?;
    load_stats(&IndexPaths::new(stats))?.apply(&mut config)?;
    let encoder = SparseEncoder::new(TextTokenizer::from_config(&config.tokenizer)?, Bm25::new(config.bm25)?);

    let docs = read_documents(Path::new(input), text_fields)?;
    if let Some(dir) = Path::new(output).parent() {
        fs::create_dir_all(dir)?;
    }
    let mut out = BufWriter::new(File::create(output)?);
    let mut empty = 0usize;
    for doc in &docs {
        let sparse = encoder.embed(&doc.text)?;
        if sparse.is_empty() {
            empty += 1;
        }
        serde_json::to_writer(&mut out, &EncodedDoc { id: &doc.id, sparse: &sparse, payload: &doc.payload })?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    tracing::info!(output, docs = docs.len(), empty, "sparse vectors written");
    Ok(())
}

fn read_documents(input: &Path, text_fields: &[String]) -> Result<Vec<Document>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }

    let mut docs = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, text_fields, &mut docs)?;
        } else {
            read_json(&file, text_fields, &mut docs)?;
        }
    }
    tracing::info!(num_docs = docs.len(), "read documents");
    Ok(docs)
}

fn read_jsonl(file: &Path, text_fields: &[String], docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let value: serde_json::Value = serde_json::from_str(&line)?;
        docs.push(to_document(value, text_fields, docs.len())?);
    }
    Ok(())
}

fn read_json(file: &Path, text_fields: &[String], docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(to_document(v, text_fields, docs.len())?);
            }
        }
        serde_json::Value::Object(_) => docs.push(to_document(json, text_fields, docs.len())?),
        _ => tracing::warn!(file = %file.display(), "skipping non-object json"),
    }
    Ok(())
}

/// Scraped fields are sometimes lists of fragments; those are joined with
/// spaces.
fn field_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(field_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn to_document(value: serde_json::Value, text_fields: &[String], position: usize) -> Result<Document> {
    let serde_json::Value::Object(payload) = value else {
        bail!("document {position} is not a JSON object");
    };
    let id = match payload.get("id") {
        Some(serde_json::Value::String(s)) => PointId::Uuid(s.clone()),
        other => PointId::Num(other.and_then(serde_json::Value::as_u64).unwrap_or(position as u64)),
    };
    let text = text_fields
        .iter()
        .filter_map(|f| payload.get(f).and_then(field_text))
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Document { id, text, payload })
}
