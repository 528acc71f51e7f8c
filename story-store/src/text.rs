//! BM25 relevance scoring with typo-tolerant term matching.
//!
//! Every text query builds a small inverted view over the requested fields of
//! the candidate documents and scores them with Okapi BM25 (Lucene flavour of
//! IDF). Query terms also match document terms within a bounded Levenshtein
//! distance, provided both share a literal prefix.

use crate::record::StoryDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Term-frequency saturation
const K1: f32 = 1.2;
/// Document-length normalisation
const B: f32 = 0.75;

/// Fuzzy matching tolerance for text queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyOptions {
    /// Maximum edit distance between a query term and a document term
    #[serde(default = "default_max_edits")]
    pub max_edits: usize,

    /// Number of leading characters that must match exactly
    #[serde(default = "default_prefix_length")]
    pub prefix_length: usize,
}

fn default_max_edits() -> usize {
    1
}

fn default_prefix_length() -> usize {
    2
}

impl Default for FuzzyOptions {
    fn default() -> Self {
        Self {
            max_edits: default_max_edits(),
            prefix_length: default_prefix_length(),
        }
    }
}

impl FuzzyOptions {
    /// Exact term matching only
    pub fn exact() -> Self {
        Self {
            max_edits: 0,
            prefix_length: 0,
        }
    }
}

/// Split text into lowercase terms.
///
/// Hyphens and underscores inside a term are kept so tracker keys such as
/// `HC-257` stay a single term.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .map(|raw| raw.trim_matches(|c| c == '-' || c == '_'))
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Edit distance between `query` and `term` when it is within tolerance.
///
/// Returns `Some(0)` for an exact match. Query terms no longer than the
/// required prefix only ever match exactly.
pub fn fuzzy_distance(query: &str, term: &str, options: &FuzzyOptions) -> Option<usize> {
    if query == term {
        return Some(0);
    }
    if options.max_edits == 0 {
        return None;
    }

    let query_chars: Vec<char> = query.chars().collect();
    let term_chars: Vec<char> = term.chars().collect();

    if query_chars.len() <= options.prefix_length || term_chars.len() < options.prefix_length {
        return None;
    }
    if query_chars[..options.prefix_length] != term_chars[..options.prefix_length] {
        return None;
    }
    if query_chars.len().abs_diff(term_chars.len()) > options.max_edits {
        return None;
    }

    let distance = strsim::levenshtein(query, term);
    (distance <= options.max_edits).then_some(distance)
}

/// Per-query BM25 scorer over a set of documents
pub struct Bm25Scorer {
    /// term -> frequency, one map per document
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lengths: Vec<usize>,
    /// term -> number of documents containing it
    doc_freqs: HashMap<String, usize>,
    avg_doc_length: f32,
}

impl Bm25Scorer {
    /// Index the given fields of every document
    pub fn new(documents: &[&StoryDocument], fields: &[String]) -> Self {
        let mut term_freqs = Vec::with_capacity(documents.len());
        let mut doc_lengths = Vec::with_capacity(documents.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();

        for document in documents {
            let mut freqs: HashMap<String, usize> = HashMap::new();
            let mut length = 0;
            for field in fields {
                if let Some(text) = document.text_field(field) {
                    for term in tokenize(&text) {
                        length += 1;
                        *freqs.entry(term).or_insert(0) += 1;
                    }
                }
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
            doc_lengths.push(length);
        }

        let total: usize = doc_lengths.iter().sum();
        let avg_doc_length = if doc_lengths.is_empty() {
            0.0
        } else {
            total as f32 / doc_lengths.len() as f32
        };

        Self {
            term_freqs,
            doc_lengths,
            doc_freqs,
            avg_doc_length,
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.doc_lengths.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// Score every document against the query; index-aligned with the input documents.
    ///
    /// Fuzzy matches are down-weighted by `1 - distance / shorter_term_length`.
    pub fn score(&self, query: &str, fuzzy: &FuzzyOptions) -> Vec<f32> {
        let query_terms = tokenize(query);
        let mut scores = vec![0.0_f32; self.term_freqs.len()];
        if query_terms.is_empty() || self.avg_doc_length == 0.0 {
            return scores;
        }

        for query_term in &query_terms {
            // Expand the query term to the document vocabulary once per query term.
            let expansions: Vec<(&String, f32)> = self
                .doc_freqs
                .keys()
                .filter_map(|term| {
                    let distance = fuzzy_distance(query_term, term, fuzzy)?;
                    let shorter = query_term.chars().count().min(term.chars().count()).max(1);
                    let boost = 1.0 - distance as f32 / shorter as f32;
                    Some((term, boost))
                })
                .collect();

            for (term, boost) in expansions {
                let idf = self.idf(term);
                for (doc, freqs) in self.term_freqs.iter().enumerate() {
                    let Some(&tf) = freqs.get(term) else {
                        continue;
                    };
                    let tf = tf as f32;
                    let length_norm =
                        1.0 - B + B * self.doc_lengths[doc] as f32 / self.avg_doc_length;
                    scores[doc] += boost * idf * tf * (K1 + 1.0) / (tf + K1 * length_norm);
                }
            }
        }

        scores
    }
}
