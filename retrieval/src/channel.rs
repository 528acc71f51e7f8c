//! Connection handling and result shaping shared by both search channels.

use crate::candidate::{Channel, SearchCandidate};
use crate::error::{Result, RetrievalError};
use log::{debug, warn};
use storyrag_store::{ConnectionFactory, Filters, ScoredStory, TextQuery, VectorQuery};

const SUMMARY_PREVIEW_CHARS: usize = 60;

pub(crate) enum StoreRequest<'a> {
    Vector(&'a VectorQuery),
    Text(&'a TextQuery),
}

impl StoreRequest<'_> {
    fn channel(&self) -> Channel {
        match self {
            StoreRequest::Vector(_) => Channel::Vector,
            StoreRequest::Text(_) => Channel::Bm25,
        }
    }
}

/// Run one request on a fresh connection and close it on every exit path.
///
/// A failed close after the request itself finished is logged, not returned:
/// the caller already has its answer.
pub(crate) async fn execute(
    factory: &dyn ConnectionFactory,
    request: StoreRequest<'_>,
) -> Result<Vec<ScoredStory>> {
    let channel = request.channel();
    let connection = factory
        .connect()
        .await
        .map_err(|e| RetrievalError::channel(channel, e))?;

    let outcome = match request {
        StoreRequest::Vector(query) => connection.vector_search(query).await,
        StoreRequest::Text(query) => connection.text_search(query).await,
    };

    if let Err(e) = connection.close().await {
        warn!("Failed to close {channel} store connection: {e}");
    }

    outcome.map_err(|e| RetrievalError::channel(channel, e))
}

/// Post-search stages: drop unusable scores, apply filters, cut to `top_k`, project.
pub(crate) fn finish(
    channel: Channel,
    hits: Vec<ScoredStory>,
    top_k: usize,
    filters: &Filters,
) -> Vec<SearchCandidate> {
    let candidates: Vec<SearchCandidate> = hits
        .into_iter()
        .filter(|hit| {
            let finite = hit.score.is_finite();
            if !finite {
                warn!(
                    "Dropping {} from {channel} results: non-finite score {}",
                    hit.document.key, hit.score
                );
            }
            finite
        })
        .filter(|hit| hit.document.matches(filters))
        .take(top_k)
        .map(SearchCandidate::from)
        .collect();

    debug!("{channel} search returned {} candidates", candidates.len());
    for candidate in &candidates {
        let preview: String = candidate.summary.chars().take(SUMMARY_PREVIEW_CHARS).collect();
        debug!("  [{:.4}] {} {}", candidate.score, candidate.key, preview);
    }

    candidates
}

pub(crate) fn require_top_k(channel: Channel, top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(RetrievalError::Validation(format!(
            "{channel} search needs top_k > 0"
        )));
    }
    Ok(())
}
