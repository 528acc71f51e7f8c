/*!
# Storyrag Retrieval

Hybrid retrieval of user stories for grounding a language-model prompt:
- **Query normalization** into one canonical form shared by every channel
- **Vector search** over stored story embeddings (k-nearest-neighbour)
- **BM25 search** over key, summary and description with typo tolerance
- **Score fusion**: per-channel min/max normalization, weighted blend and provenance

## Architecture

```text
Query
  └─> Normalizer
        ├─> Embedding provider ─> Vector channel ─┐
        │                                         ├─> Fusion ─> Ranked stories
        └─> BM25 channel ─────────────────────────┘
```

The two channels share no data and run concurrently. Each opens its own store
connection and closes it before returning, on success and failure alike.

## Example

```rust,no_run
use std::sync::Arc;
use storyrag_embeddings::{HttpEmbeddingConfig, HttpEmbeddingProvider};
use storyrag_retrieval::{HybridRetrieval, RetrievalConfig};
use storyrag_store::{Filters, JsonFileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RetrievalConfig::from_env()?;
    let provider = HttpEmbeddingProvider::new(HttpEmbeddingConfig::from_env()?)?;
    let store = JsonFileStore::new("stories.json", config.store_config());

    let retrieval = HybridRetrieval::new(config, Arc::new(provider), Arc::new(store))?;
    let results = retrieval.search("password reset email", &Filters::new()).await?;

    for (i, story) in results.top(5).iter().enumerate() {
        println!(
            "{}. {} {} ({:.4}, {})",
            i + 1,
            story.key,
            story.summary,
            story.hybrid_score,
            story.found_in
        );
    }

    Ok(())
}
```

## Fusion

Each channel's raw scores are scaled by `(score - min) / range`, where the max
also considers 1, the min also considers 0 and the range is at least 1. The
hybrid score is `bm25_weight * bm25_normalized + vector_weight * vector_normalized`.
Scaling is per call: scores from different queries are not comparable.
*/

mod candidate;
mod channel;
mod config;
mod error;
mod fusion;
mod lexical;
mod normalize;
mod retrieval;
mod vector;

pub use candidate::{
    Channel, FoundIn, FoundInCounts, FusedResult, RetrievalResults, SearchCandidate, SearchStats,
};
pub use config::{LexicalQuery, RetrievalConfig};
pub use error::{ErrorKind, Result, RetrievalError};
pub use fusion::{FusionEngine, ScoreRange, hybrid_search, normalize_scores};
pub use lexical::LexicalChannel;
pub use normalize::{NormalizeOptions, NormalizedQuery, normalize, normalize_text};
pub use retrieval::HybridRetrieval;
pub use vector::{CANDIDATES_PER_RESULT, MIN_NUM_CANDIDATES, VectorChannel, candidate_pool};
