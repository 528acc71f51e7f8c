use crate::error::{Result, RetrievalError};
use crate::normalize::NormalizeOptions;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use storyrag_store::{FuzzyOptions, StoreConfig};

/// Which form of the query the lexical channel receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalQuery {
    /// The query exactly as the user typed it
    Raw,
    /// The normalized query shared with the embedding request
    Normalized,
}

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of fused results to return
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Weight of the normalized vector score (0.0 - 1.0)
    #[serde(default = "default_weight")]
    pub vector_weight: f32,

    /// Weight of the normalized BM25 score (0.0 - 1.0)
    #[serde(default = "default_weight")]
    pub bm25_weight: f32,

    /// Fields searched by the lexical channel
    #[serde(default = "default_lexical_fields")]
    pub lexical_fields: Vec<String>,

    /// Typo tolerance of the lexical channel
    #[serde(default)]
    pub fuzzy: FuzzyOptions,

    #[serde(default = "default_vector_index")]
    pub vector_index: String,

    /// Field holding stored embeddings
    #[serde(default = "default_embedding_path")]
    pub embedding_path: String,

    #[serde(default = "default_text_index")]
    pub text_index: String,

    /// Query normalization switches
    #[serde(default)]
    pub normalize: NormalizeOptions,

    #[serde(default = "default_lexical_query")]
    pub lexical_query: LexicalQuery,

    /// Per-channel deadline; `None` waits indefinitely
    #[serde(default)]
    pub channel_timeout_ms: Option<u64>,
}

fn default_top_k() -> usize {
    5
}

fn default_weight() -> f32 {
    0.5
}

fn default_lexical_fields() -> Vec<String> {
    vec![
        "key".to_string(),
        "summary".to_string(),
        "description".to_string(),
    ]
}

fn default_vector_index() -> String {
    StoreConfig::default().vector_index
}

fn default_embedding_path() -> String {
    StoreConfig::default().embedding_path
}

fn default_text_index() -> String {
    StoreConfig::default().text_index
}

fn default_lexical_query() -> LexicalQuery {
    LexicalQuery::Raw
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            vector_weight: default_weight(),
            bm25_weight: default_weight(),
            lexical_fields: default_lexical_fields(),
            fuzzy: FuzzyOptions::default(),
            vector_index: default_vector_index(),
            embedding_path: default_embedding_path(),
            text_index: default_text_index(),
            normalize: NormalizeOptions::default(),
            lexical_query: default_lexical_query(),
            channel_timeout_ms: None,
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.top_k == 0 {
            return Err("top_k must be > 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.vector_weight) {
            return Err(format!(
                "vector_weight must be in [0.0, 1.0], got {}",
                self.vector_weight
            ));
        }

        if !(0.0..=1.0).contains(&self.bm25_weight) {
            return Err(format!(
                "bm25_weight must be in [0.0, 1.0], got {}",
                self.bm25_weight
            ));
        }

        if self.lexical_fields.is_empty() {
            return Err("lexical_fields must name at least one field".to_string());
        }

        if self.vector_index.is_empty() || self.text_index.is_empty() {
            return Err("index names must not be empty".to_string());
        }

        if self.embedding_path.is_empty() {
            return Err("embedding_path must not be empty".to_string());
        }

        if self.channel_timeout_ms == Some(0) {
            return Err("channel_timeout_ms must be > 0 when set".to_string());
        }

        Ok(())
    }

    /// Favour exact wording (tracker keys, product names)
    pub fn lexical_heavy() -> Self {
        Self {
            vector_weight: 0.3,
            bm25_weight: 0.7,
            ..Default::default()
        }
    }

    /// Favour meaning over wording
    pub fn semantic_heavy() -> Self {
        Self {
            vector_weight: 0.7,
            bm25_weight: 0.3,
            ..Default::default()
        }
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the known variables.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(index) = get("VECTOR_INDEX_NAME") {
            config.vector_index = index;
        }
        if let Some(index) = get("BM25_INDEX_NAME") {
            config.text_index = index;
        }
        if let Some(value) = get("RETRIEVAL_TOP_K") {
            config.top_k = parse_var("RETRIEVAL_TOP_K", &value)?;
        }
        if let Some(value) = get("RETRIEVAL_VECTOR_WEIGHT") {
            config.vector_weight = parse_var("RETRIEVAL_VECTOR_WEIGHT", &value)?;
        }
        if let Some(value) = get("RETRIEVAL_BM25_WEIGHT") {
            config.bm25_weight = parse_var("RETRIEVAL_BM25_WEIGHT", &value)?;
        }
        if let Some(value) = get("RETRIEVAL_CHANNEL_TIMEOUT_MS") {
            config.channel_timeout_ms = Some(parse_var("RETRIEVAL_CHANNEL_TIMEOUT_MS", &value)?);
        }

        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(config)
    }

    /// Store-side names this configuration expects
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            vector_index: self.vector_index.clone(),
            embedding_path: self.embedding_path.clone(),
            text_index: self.text_index.clone(),
        }
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RetrievalError::InvalidConfig(format!("{name}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config_valid() {
        let config = RetrievalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 5);
        assert_eq!(config.lexical_fields, vec!["key", "summary", "description"]);
        assert_eq!(config.fuzzy, FuzzyOptions::default());
        assert_eq!(config.lexical_query, LexicalQuery::Raw);
    }

    #[test]
    fn test_weight_validation() {
        let mut config = RetrievalConfig::default();
        config.vector_weight = 1.0;
        config.bm25_weight = 1.0;
        assert!(config.validate().is_ok());

        config.vector_weight = -0.1;
        assert!(config.validate().is_err());

        config.vector_weight = 0.5;
        config.bm25_weight = 1.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_structural_validation() {
        let mut config = RetrievalConfig::default();
        config.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = RetrievalConfig::default();
        config.lexical_fields.clear();
        assert!(config.validate().is_err());

        let mut config = RetrievalConfig::default();
        config.channel_timeout_ms = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_preset_configs() {
        assert!(RetrievalConfig::lexical_heavy().validate().is_ok());
        assert!(RetrievalConfig::semantic_heavy().validate().is_ok());
        assert_eq!(RetrievalConfig::semantic_heavy().vector_weight, 0.7);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RetrievalConfig =
            serde_json::from_str(r#"{"top_k": 8, "lexical_query": "normalized"}"#).unwrap();
        assert_eq!(config.top_k, 8);
        assert_eq!(config.lexical_query, LexicalQuery::Normalized);
        assert_eq!(config.vector_weight, 0.5);
        assert_eq!(config.text_index, "bm25_index");
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = RetrievalConfig::from_lookup(lookup(&[
            ("VECTOR_INDEX_NAME", "stories_vec"),
            ("BM25_INDEX_NAME", "stories_text"),
            ("RETRIEVAL_TOP_K", "10"),
            ("RETRIEVAL_VECTOR_WEIGHT", "0.6"),
            ("RETRIEVAL_BM25_WEIGHT", " 0.4 "),
            ("RETRIEVAL_CHANNEL_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();

        assert_eq!(config.vector_index, "stories_vec");
        assert_eq!(config.text_index, "stories_text");
        assert_eq!(config.top_k, 10);
        assert_eq!(config.bm25_weight, 0.4);
        assert_eq!(config.channel_timeout_ms, Some(2500));
        assert_eq!(config.store_config().text_index, "stories_text");
    }

    #[test]
    fn test_from_lookup_rejects_bad_values() {
        let err = RetrievalConfig::from_lookup(lookup(&[("RETRIEVAL_TOP_K", "many")])).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfig(_)));

        let err =
            RetrievalConfig::from_lookup(lookup(&[("RETRIEVAL_VECTOR_WEIGHT", "2")])).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfig(_)));
    }

    #[test]
    fn test_from_lookup_ignores_blank_values() {
        let config = RetrievalConfig::from_lookup(lookup(&[("VECTOR_INDEX_NAME", "  ")])).unwrap();
        assert_eq!(config, RetrievalConfig::default());
    }
}
