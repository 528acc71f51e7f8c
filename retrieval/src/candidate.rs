use crate::normalize::NormalizedQuery;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use storyrag_store::{Filters, ScoredStory, active_filters, filter_value_matches};

/// A retrieval channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Nearest-neighbour search over embeddings
    Vector,
    /// BM25 full-text search
    Bm25,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Vector => write!(f, "vector"),
            Channel::Bm25 => write!(f, "bm25"),
        }
    }
}

/// Which channel(s) produced a fused result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoundIn {
    Vector,
    Bm25,
    Both,
}

impl fmt::Display for FoundIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FoundIn::Vector => write!(f, "vector"),
            FoundIn::Bm25 => write!(f, "bm25"),
            FoundIn::Both => write!(f, "both"),
        }
    }
}

/// A story returned by one channel, with that channel's native score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    pub key: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    pub score: f32,
}

impl SearchCandidate {
    pub fn new(
        id: impl Into<String>,
        key: impl Into<String>,
        summary: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            summary: summary.into(),
            status: None,
            score,
        }
    }

    pub fn with_status(mut self, status: Value) -> Self {
        self.status = Some(status);
        self
    }

    pub fn status_name(&self) -> Option<&str> {
        status_name(self.status.as_ref())
    }
}

impl From<ScoredStory> for SearchCandidate {
    fn from(hit: ScoredStory) -> Self {
        let document = hit.document;
        Self {
            id: document.id,
            key: document.key,
            summary: document.summary,
            status: document.status,
            score: hit.score,
        }
    }
}

fn status_name(status: Option<&Value>) -> Option<&str> {
    match status? {
        Value::String(s) => Some(s),
        Value::Object(map) => map.get("name").and_then(Value::as_str),
        _ => None,
    }
}

/// A candidate after fusion, carrying both channels' scores and its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedResult {
    pub id: String,
    pub key: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    /// Native score of the entry as first seen (lexical before vector)
    pub score: f32,
    /// Raw BM25 score, 0 when the lexical channel did not find the story
    pub bm25_score: f32,
    /// Raw vector similarity, 0 when the vector channel did not find the story
    pub vector_score: f32,
    pub bm25_score_normalized: f32,
    pub vector_score_normalized: f32,
    pub hybrid_score: f32,
    pub found_in: FoundIn,
}

impl FusedResult {
    pub fn status_name(&self) -> Option<&str> {
        status_name(self.status.as_ref())
    }

    /// Equality filters over the fields a fused result carries.
    ///
    /// Paths naming fields outside `id`, `key`, `summary` and `status` cannot
    /// be evaluated here and are skipped.
    pub fn matches(&self, filters: &Filters) -> bool {
        active_filters(filters).all(|(path, expected)| {
            let mut segments = path.split('.');
            let actual = match segments.next() {
                Some("id" | "_id") => Some(Value::String(self.id.clone())),
                Some("key") => Some(Value::String(self.key.clone())),
                Some("summary") => Some(Value::String(self.summary.clone())),
                Some("status") => {
                    segments.fold(self.status.clone(), |current, segment| match current {
                        Some(Value::Object(mut map)) => map.remove(segment),
                        _ => None,
                    })
                }
                _ => return true,
            };
            actual.is_some_and(|actual| filter_value_matches(&actual, expected))
        })
    }
}

/// Provenance breakdown of a fused list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundInCounts {
    pub both: usize,
    pub bm25_only: usize,
    pub vector_only: usize,
}

impl FoundInCounts {
    pub fn tally(results: &[FusedResult]) -> Self {
        results
            .iter()
            .fold(Self::default(), |mut counts, result| {
                match result.found_in {
                    FoundIn::Both => counts.both += 1,
                    FoundIn::Bm25 => counts.bm25_only += 1,
                    FoundIn::Vector => counts.vector_only += 1,
                }
                counts
            })
    }
}

/// Search performance statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    /// Total search time in milliseconds
    pub total_time_ms: u64,

    /// Embedding request time in milliseconds
    pub embedding_time_ms: u64,

    /// Vector channel time in milliseconds
    pub vector_time_ms: u64,

    /// Lexical channel time in milliseconds
    pub bm25_time_ms: u64,

    /// Fusion time in milliseconds
    pub fusion_time_ms: u64,

    /// Number of vector candidates
    pub vector_count: usize,

    /// Number of lexical candidates
    pub bm25_count: usize,

    /// Provenance of the returned results
    pub found_in: FoundInCounts,
}

/// Ordered fused results for one query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResults {
    /// Query that produced these results
    pub query: NormalizedQuery,

    /// Fused results, best first
    pub results: Vec<FusedResult>,

    /// Search statistics
    pub stats: SearchStats,
}

impl RetrievalResults {
    /// Get top N results
    pub fn top(&self, n: usize) -> &[FusedResult] {
        &self.results[..n.min(self.results.len())]
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
