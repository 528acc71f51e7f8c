use crate::candidate::{Channel, SearchCandidate};
use crate::channel::{StoreRequest, execute, finish, require_top_k};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use log::debug;
use std::sync::Arc;
use storyrag_store::{ConnectionFactory, Filters, VectorQuery};

/// Smallest candidate pool handed to the nearest-neighbour index
pub const MIN_NUM_CANDIDATES: usize = 100;

/// Candidates fetched per requested result
pub const CANDIDATES_PER_RESULT: usize = 10;

/// Pool size and pre-filter limit for a request of `top_k` results.
///
/// The index ranks `num_candidates` entries and returns at most `limit` of
/// them; filtering and the final cut to `top_k` happen afterwards.
pub fn candidate_pool(top_k: usize) -> (usize, usize) {
    let wanted = top_k.saturating_mul(CANDIDATES_PER_RESULT);
    let num_candidates = wanted.max(MIN_NUM_CANDIDATES);
    (num_candidates, num_candidates.min(wanted))
}

/// k-nearest-neighbour search over stored story embeddings
#[derive(Clone)]
pub struct VectorChannel {
    connections: Arc<dyn ConnectionFactory>,
    index: String,
    path: String,
}

impl VectorChannel {
    pub fn new(
        connections: Arc<dyn ConnectionFactory>,
        index: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            connections,
            index: index.into(),
            path: path.into(),
        }
    }

    pub fn from_config(connections: Arc<dyn ConnectionFactory>, config: &RetrievalConfig) -> Self {
        Self::new(connections, &config.vector_index, &config.embedding_path)
    }

    /// Stories nearest to `query_vector`, best first, with the index's similarity as score
    pub async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: &Filters,
    ) -> Result<Vec<SearchCandidate>> {
        require_top_k(Channel::Vector, top_k)?;
        if query_vector.is_empty() {
            return Err(RetrievalError::Validation(
                "vector search needs a non-empty query vector".to_string(),
            ));
        }

        let (num_candidates, limit) = candidate_pool(top_k);
        let query = VectorQuery {
            index: self.index.clone(),
            path: self.path.clone(),
            query_vector: query_vector.to_vec(),
            num_candidates,
            limit,
        };
        debug!(
            "Vector search on '{}' (numCandidates={num_candidates}, limit={limit}, topK={top_k})",
            self.index
        );

        let hits = execute(self.connections.as_ref(), StoreRequest::Vector(&query)).await?;
        Ok(finish(Channel::Vector, hits, top_k, filters))
    }
}
