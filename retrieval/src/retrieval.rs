use crate::candidate::{Channel, FoundInCounts, RetrievalResults, SearchStats};
use crate::config::{LexicalQuery, RetrievalConfig};
use crate::error::{Result, RetrievalError};
use crate::fusion::FusionEngine;
use crate::lexical::LexicalChannel;
use crate::normalize::normalize;
use crate::vector::VectorChannel;
use log::{debug, info};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storyrag_embeddings::EmbeddingProvider;
use storyrag_store::{ConnectionFactory, Filters};

/// Hybrid retrieval engine combining vector and BM25 search
pub struct HybridRetrieval {
    config: RetrievalConfig,
    embeddings: Arc<dyn EmbeddingProvider>,
    vector: VectorChannel,
    lexical: LexicalChannel,
    fusion: FusionEngine,
}

impl HybridRetrieval {
    /// Create new hybrid retrieval engine
    pub fn new(
        config: RetrievalConfig,
        embeddings: Arc<dyn EmbeddingProvider>,
        connections: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;

        info!(
            "Initializing hybrid retrieval (vector index '{}', text index '{}')",
            config.vector_index, config.text_index
        );

        Ok(Self {
            vector: VectorChannel::from_config(Arc::clone(&connections), &config),
            lexical: LexicalChannel::from_config(connections, &config),
            fusion: FusionEngine::from_config(&config),
            embeddings,
            config,
        })
    }

    /// Search with the configured `top_k`
    pub async fn search(&self, query: &str, filters: &Filters) -> Result<RetrievalResults> {
        self.search_top_k(query, self.config.top_k, filters).await
    }

    /// Search for the `top_k` stories most related to `query`.
    ///
    /// Both channels run concurrently; the first failure (or timeout) aborts the
    /// whole call.
    pub async fn search_top_k(
        &self,
        query: &str,
        top_k: usize,
        filters: &Filters,
    ) -> Result<RetrievalResults> {
        let start = Instant::now();

        if top_k == 0 {
            return Err(RetrievalError::Validation("top_k must be > 0".to_string()));
        }

        let normalized = normalize(query, &self.config.normalize);
        if normalized.is_empty() {
            return Err(RetrievalError::Validation(
                "query is empty after normalization".to_string(),
            ));
        }
        debug!(
            "Hybrid search for '{}' (normalized '{}')",
            normalized.original, normalized.normalized
        );

        let mut stats = SearchStats::default();

        // Stage 1: Embedding
        let embedding_start = Instant::now();
        let embedding = self.embeddings.embed(&normalized.normalized).await?;
        stats.embedding_time_ms = elapsed_ms(embedding_start);
        debug!(
            "Embedding: {} dimensions, status {}",
            embedding.vector.len(),
            embedding.status
        );

        // Stage 2: Both channels
        let lexical_text = match self.config.lexical_query {
            LexicalQuery::Raw => normalized.original.as_str(),
            LexicalQuery::Normalized => normalized.normalized.as_str(),
        };
        let timeout_ms = self.config.channel_timeout_ms;

        let vector_search = timed(with_deadline(
            Channel::Vector,
            timeout_ms,
            self.vector.search(&embedding.vector, top_k, filters),
        ));
        let lexical_search = timed(with_deadline(
            Channel::Bm25,
            timeout_ms,
            self.lexical.search(lexical_text, top_k, filters),
        ));

        let ((vector_results, vector_ms), (bm25_results, bm25_ms)) =
            tokio::try_join!(vector_search, lexical_search)?;

        stats.vector_time_ms = vector_ms;
        stats.bm25_time_ms = bm25_ms;
        stats.vector_count = vector_results.len();
        stats.bm25_count = bm25_results.len();

        // Stage 3: Fusion
        let fusion_start = Instant::now();
        let results = self
            .fusion
            .with_top_k(top_k)
            .fuse(&vector_results, &bm25_results, filters);
        stats.fusion_time_ms = elapsed_ms(fusion_start);
        stats.found_in = FoundInCounts::tally(&results);
        stats.total_time_ms = elapsed_ms(start);

        info!(
            "Search completed in {}ms, returned {} results ({} both, {} bm25, {} vector)",
            stats.total_time_ms,
            results.len(),
            stats.found_in.both,
            stats.found_in.bm25_only,
            stats.found_in.vector_only
        );

        Ok(RetrievalResults {
            query: normalized,
            results,
            stats,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}

/// Fail the channel with `Timeout` when it outlives its deadline.
async fn with_deadline<T, F>(channel: Channel, timeout_ms: Option<u64>, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout_ms {
        None => future.await,
        Some(timeout_ms) => tokio::time::timeout(Duration::from_millis(timeout_ms), future)
            .await
            .map_err(|_| RetrievalError::Timeout {
                channel,
                timeout_ms,
            })?,
    }
}

async fn timed<T, F>(future: F) -> Result<(T, u64)>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();
    let value = future.await?;
    Ok((value, elapsed_ms(start)))
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
