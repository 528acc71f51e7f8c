use crate::candidate::{FoundIn, FoundInCounts, FusedResult, SearchCandidate};
use crate::config::RetrievalConfig;
use indexmap::IndexMap;
use indexmap::map::Entry;
use log::debug;
use std::cmp::Ordering;
use storyrag_store::Filters;

/// Per-call min/max scale of one channel's raw scores.
///
/// The max is taken over the scores and 1, the min over the scores and 0, and
/// the range never drops below 1. An empty or single-valued channel therefore
/// still maps into `[0, 1]` without dividing by zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: f32,
    pub max: f32,
    pub range: f32,
}

impl ScoreRange {
    pub fn of<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = f32>,
    {
        let (min, max) = scores
            .into_iter()
            .filter(|score| score.is_finite())
            .fold((0.0_f32, 1.0_f32), |(min, max), score| {
                (min.min(score), max.max(score))
            });
        Self {
            min,
            max,
            range: (max - min).max(1.0),
        }
    }

    /// Map a raw score onto `[0, 1]`; non-finite scores map to 0.
    pub fn normalize(&self, score: f32) -> f32 {
        if !score.is_finite() {
            return 0.0;
        }
        ((score - self.min) / self.range).clamp(0.0, 1.0)
    }
}

/// Normalize a channel's scores against its own range
pub fn normalize_scores(scores: &[f32]) -> Vec<f32> {
    let range = ScoreRange::of(scores.iter().copied());
    scores.iter().map(|score| range.normalize(*score)).collect()
}

/// Weighted linear blend of the two channels' normalized scores
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionEngine {
    vector_weight: f32,
    bm25_weight: f32,
    top_k: usize,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(0.5, 0.5, 5)
    }
}

impl FusionEngine {
    /// Create new fusion engine
    pub fn new(vector_weight: f32, bm25_weight: f32, top_k: usize) -> Self {
        Self {
            vector_weight,
            bm25_weight,
            top_k,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.vector_weight, config.bm25_weight, config.top_k)
    }

    pub fn with_top_k(self, top_k: usize) -> Self {
        Self { top_k, ..self }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Merge both channels into one list, best first.
    ///
    /// Lexical candidates are inserted before vector candidates, so equal
    /// hybrid scores keep lexical entries ahead of vector-only ones. Within a
    /// channel the first occurrence of an id wins.
    pub fn fuse(
        &self,
        vector_results: &[SearchCandidate],
        bm25_results: &[SearchCandidate],
        filters: &Filters,
    ) -> Vec<FusedResult> {
        debug!(
            "Hybrid fusion: {} bm25 + {} vector (weights bm25={}, vector={})",
            bm25_results.len(),
            vector_results.len(),
            self.bm25_weight,
            self.vector_weight
        );

        let bm25_range = ScoreRange::of(bm25_results.iter().map(|c| c.score));
        let vector_range = ScoreRange::of(vector_results.iter().map(|c| c.score));

        let mut merged: IndexMap<String, FusedResult> = IndexMap::new();

        for candidate in bm25_results {
            if merged.contains_key(&candidate.id) {
                debug!("Ignoring repeated bm25 candidate {}", candidate.key);
                continue;
            }
            let normalized = bm25_range.normalize(candidate.score);
            merged.insert(
                candidate.id.clone(),
                FusedResult {
                    id: candidate.id.clone(),
                    key: candidate.key.clone(),
                    summary: candidate.summary.clone(),
                    status: candidate.status.clone(),
                    score: candidate.score,
                    bm25_score: candidate.score,
                    vector_score: 0.0,
                    bm25_score_normalized: normalized,
                    vector_score_normalized: 0.0,
                    hybrid_score: normalized * self.bm25_weight,
                    found_in: FoundIn::Bm25,
                },
            );
        }

        for candidate in vector_results {
            let normalized = vector_range.normalize(candidate.score);
            match merged.entry(candidate.id.clone()) {
                Entry::Occupied(mut entry) => {
                    let existing = entry.get_mut();
                    if existing.found_in != FoundIn::Bm25 {
                        debug!("Ignoring repeated vector candidate {}", candidate.key);
                        continue;
                    }
                    existing.vector_score = candidate.score;
                    existing.vector_score_normalized = normalized;
                    existing.hybrid_score += normalized * self.vector_weight;
                    existing.found_in = FoundIn::Both;
                }
                Entry::Vacant(entry) => {
                    entry.insert(FusedResult {
                        id: candidate.id.clone(),
                        key: candidate.key.clone(),
                        summary: candidate.summary.clone(),
                        status: candidate.status.clone(),
                        score: candidate.score,
                        bm25_score: 0.0,
                        vector_score: candidate.score,
                        bm25_score_normalized: 0.0,
                        vector_score_normalized: normalized,
                        hybrid_score: normalized * self.vector_weight,
                        found_in: FoundIn::Vector,
                    });
                }
            }
        }

        let mut results: Vec<FusedResult> = merged
            .into_values()
            .filter(|result| result.matches(filters))
            .collect();

        // Vec::sort_by is stable: ties keep insertion order
        results.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(self.top_k);

        let counts = FoundInCounts::tally(&results);
        debug!(
            "Fusion produced {} results (both={}, bm25={}, vector={})",
            results.len(),
            counts.both,
            counts.bm25_only,
            counts.vector_only
        );

        results
    }
}

/// Fuse one call's channel results with explicit weights and output size
pub fn hybrid_search(
    vector_results: &[SearchCandidate],
    bm25_results: &[SearchCandidate],
    top_k: usize,
    filters: &Filters,
    vector_weight: f32,
    bm25_weight: f32,
) -> Vec<FusedResult> {
    FusionEngine::new(vector_weight, bm25_weight, top_k).fuse(vector_results, bm25_results, filters)
}
