use crate::context::format_document_context;
use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use owo_colors::OwoColorize;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storyrag_embeddings::{
    EmbeddingProvider, HttpEmbeddingConfig, HttpEmbeddingProvider, StaticEmbeddingProvider,
};
use storyrag_retrieval::{HybridRetrieval, RetrievalConfig, RetrievalResults};
use storyrag_store::{ConnectionFactory, Filters, JsonFileStore};

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search query
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// JSON array of stories to search
    #[arg(long, value_name = "PATH", env = "STORE_PATH")]
    pub store: PathBuf,

    /// Equality filter on a story field, e.g. `status.name=Done` (repeatable)
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, Value)>,

    /// Weight of the vector channel
    #[arg(long, value_name = "WEIGHT")]
    pub vector_weight: Option<f32>,

    /// Weight of the BM25 channel
    #[arg(long, value_name = "WEIGHT")]
    pub bm25_weight: Option<f32>,

    /// Serve embeddings from a local JSON table instead of the embedding API
    #[arg(long, value_name = "PATH")]
    pub embeddings: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, conflicts_with = "context")]
    pub json: bool,

    /// Print the story context block used for prompting
    #[arg(long)]
    pub context: bool,
}

/// Offline embedding table: exact text lookups plus an optional catch-all vector
#[derive(Debug, Default, Deserialize)]
pub struct EmbeddingTable {
    #[serde(default)]
    pub vectors: HashMap<String, Vec<f32>>,
    #[serde(default)]
    pub fallback: Option<Vec<f32>>,
}

impl EmbeddingTable {
    pub fn into_provider(self) -> StaticEmbeddingProvider {
        let provider = self
            .vectors
            .into_iter()
            .fold(StaticEmbeddingProvider::new(), |provider, (text, vector)| {
                provider.with_vector(text, vector)
            });
        match self.fallback {
            Some(vector) => provider.with_fallback(vector),
            None => provider,
        }
    }
}

/// Parse `field=value`; values that read as JSON (numbers, booleans, null) keep their type.
pub fn parse_filter(raw: &str) -> std::result::Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    let value = match serde_json::from_str::<Value>(value) {
        Ok(parsed @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => parsed,
        _ => Value::String(value.to_string()),
    };
    Ok((field.to_string(), value))
}

pub(crate) async fn run_search(args: SearchArgs) -> Result<()> {
    let mut config = RetrievalConfig::from_env().context("Invalid retrieval settings")?;
    if let Some(limit) = args.limit {
        config.top_k = limit;
    }
    if let Some(weight) = args.vector_weight {
        config.vector_weight = weight;
    }
    if let Some(weight) = args.bm25_weight {
        config.bm25_weight = weight;
    }

    let provider = load_provider(args.embeddings.as_deref()).await?;
    let store = Arc::new(JsonFileStore::new(&args.store, config.store_config()));
    let connections: Arc<dyn ConnectionFactory> = store.clone();
    let retrieval = HybridRetrieval::new(config, provider, connections)
        .context("Failed to initialize retrieval engine")?;

    let filters: Filters = args.filters.into_iter().collect();
    debug!("Searching {} with filters {filters:?}", store.path().display());

    let results = retrieval
        .search(&args.query, &filters)
        .await
        .context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if args.context {
        println!("{}", format_document_context(&results.results));
    } else {
        print_results(&results, retrieval.config(), store.path());
    }

    Ok(())
}

async fn load_provider(table: Option<&Path>) -> Result<Arc<dyn EmbeddingProvider>> {
    match table {
        Some(path) => {
            let content = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read embedding table {}", path.display()))?;
            let table: EmbeddingTable = serde_json::from_slice(&content)
                .with_context(|| format!("Invalid embedding table {}", path.display()))?;
            Ok(Arc::new(table.into_provider()))
        }
        None => {
            let config = HttpEmbeddingConfig::from_env()
                .context("Embedding API is not configured (or pass --embeddings)")?;
            Ok(Arc::new(HttpEmbeddingProvider::new(config)?))
        }
    }
}

fn print_results(results: &RetrievalResults, config: &RetrievalConfig, store: &Path) {
    if results.results.is_empty() {
        println!(
            "{} No stories found in {}",
            "✗".bright_red(),
            store.display()
        );
        return;
    }

    println!(
        "{} Found {} stories in {}ms for \"{}\"\n",
        "✓".bright_green(),
        results.len().to_string().bright_cyan(),
        results.stats.total_time_ms.to_string().bright_cyan(),
        results.query.normalized
    );

    for (i, result) in results.results.iter().enumerate() {
        println!(
            "{}. {} {}",
            (i + 1).to_string().bright_yellow(),
            result.key.bright_cyan(),
            result.summary
        );
        println!(
            "   {} {:.4} {} {} {} {}",
            "Score:".bright_black(),
            result.hybrid_score,
            "Found in:".bright_black(),
            result.found_in,
            "Status:".bright_black(),
            result.status_name().unwrap_or("Unknown")
        );
        println!(
            "   {} bm25 {:.4} ({:.4}), vector {:.4} ({:.4})",
            "Channels:".bright_black(),
            result.bm25_score_normalized,
            result.bm25_score,
            result.vector_score_normalized,
            result.vector_score
        );
        println!();
    }

    let stats = &results.stats;
    println!("{}", "Search Statistics:".bright_blue());
    println!("  Embedding: {}ms", stats.embedding_time_ms);
    println!(
        "  Vector search: {}ms ({} candidates)",
        stats.vector_time_ms, stats.vector_count
    );
    println!(
        "  BM25 search: {}ms ({} candidates)",
        stats.bm25_time_ms, stats.bm25_count
    );
    println!(
        "  Fusion: {}ms (vector weight {}, bm25 weight {})",
        stats.fusion_time_ms, config.vector_weight, config.bm25_weight
    );
    println!(
        "  Found in: {} both, {} bm25 only, {} vector only",
        stats.found_in.both, stats.found_in.bm25_only, stats.found_in.vector_only
    );
}
