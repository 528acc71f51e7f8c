use crate::candidate::{Channel, SearchCandidate};
use crate::channel::{StoreRequest, execute, finish, require_top_k};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use log::debug;
use std::sync::Arc;
use storyrag_store::{ConnectionFactory, Filters, FuzzyOptions, TextQuery};

/// BM25 full-text search with typo tolerance
#[derive(Clone)]
pub struct LexicalChannel {
    connections: Arc<dyn ConnectionFactory>,
    index: String,
    fields: Vec<String>,
    fuzzy: FuzzyOptions,
}

impl LexicalChannel {
    pub fn new(connections: Arc<dyn ConnectionFactory>, index: impl Into<String>) -> Self {
        Self {
            connections,
            index: index.into(),
            fields: vec![
                "key".to_string(),
                "summary".to_string(),
                "description".to_string(),
            ],
            fuzzy: FuzzyOptions::default(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_fuzzy(mut self, fuzzy: FuzzyOptions) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    pub fn from_config(connections: Arc<dyn ConnectionFactory>, config: &RetrievalConfig) -> Self {
        Self::new(connections, &config.text_index)
            .with_fields(config.lexical_fields.clone())
            .with_fuzzy(config.fuzzy)
    }

    /// Search the configured fields
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
        filters: &Filters,
    ) -> Result<Vec<SearchCandidate>> {
        self.search_fields(query_text, top_k, filters, &self.fields)
            .await
    }

    /// Search an explicit set of fields.
    ///
    /// Blank query text is rejected before any connection is opened, so an
    /// empty query can never degrade into "return everything".
    pub async fn search_fields(
        &self,
        query_text: &str,
        top_k: usize,
        filters: &Filters,
        fields: &[String],
    ) -> Result<Vec<SearchCandidate>> {
        if query_text.trim().is_empty() {
            return Err(RetrievalError::Validation(
                "lexical search needs non-empty query text".to_string(),
            ));
        }
        require_top_k(Channel::Bm25, top_k)?;

        let query = TextQuery {
            index: self.index.clone(),
            query: query_text.to_string(),
            paths: fields.to_vec(),
            fuzzy: self.fuzzy,
        };
        debug!(
            "BM25 search on '{}' over {:?} (maxEdits={}, prefixLength={}, topK={top_k})",
            self.index, query.paths, self.fuzzy.max_edits, self.fuzzy.prefix_length
        );

        let hits = execute(self.connections.as_ref(), StoreRequest::Text(&query)).await?;
        Ok(finish(Channel::Bm25, hits, top_k, filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use storyrag_store::{MemoryStore, StoreConfig, StoryDocument};

    fn store() -> MemoryStore {
        MemoryStore::with_documents(
            StoreConfig::default(),
            vec![
                StoryDocument::new("1", "HC-257", "Reset password via email")
                    .with_description("Users who forgot their password get a reset link")
                    .with_field("project", json!("HC")),
                StoryDocument::new("2", "HC-300", "Login page layout")
                    .with_description("Move the password field below the username")
                    .with_field("project", json!("HC")),
                StoryDocument::new("3", "OPS-12", "Rotate database password")
                    .with_field("project", json!("OPS")),
                StoryDocument::new("4", "HC-301", "Dark mode").with_field("project", json!("HC")),
            ],
        )
    }

    fn channel(store: &MemoryStore) -> LexicalChannel {
        LexicalChannel::new(Arc::new(store.clone()), "bm25_index")
    }

    #[tokio::test]
    async fn test_blank_query_rejected_before_store_call() {
        let store = store();
        for query in ["", "   ", "\t\n"] {
            let err = channel(&store)
                .search(query, 5, &Filters::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(store.closed_connections(), 0);
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_key_lookup_ranks_exact_story_first() {
        let store = store();
        let results = channel(&store)
            .search("HC-257", 5, &Filters::new())
            .await
            .unwrap();
        assert_eq!(results[0].key, "HC-257");
        assert_eq!(store.closed_connections(), 1);
    }

    #[tokio::test]
    async fn test_fuzzy_match_and_filters() {
        let store = store();
        let mut filters = Filters::new();
        filters.insert("project".to_string(), json!("HC"));

        let results = channel(&store).search("pasword", 5, &filters).await.unwrap();
        let keys: Vec<&str> = results.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"HC-257"));
        assert!(keys.contains(&"HC-300"));
        assert!(results.iter().all(|c| c.score > 0.0));
    }

    #[tokio::test]
    async fn test_exact_fuzzy_options_disable_typo_matching() {
        let store = store();
        let results = channel(&store)
            .with_fuzzy(FuzzyOptions::exact())
            .search("pasword", 5, &Filters::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_fields_restricts_matching() {
        let store = store();
        let results = channel(&store)
            .search_fields("forgot", 5, &Filters::new(), &["summary".to_string()])
            .await
            .unwrap();
        assert!(results.is_empty());

        let results = channel(&store)
            .search_fields("forgot", 5, &Filters::new(), &["description".to_string()])
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "HC-257");
    }

    #[tokio::test]
    async fn test_truncates_to_top_k() {
        let store = store();
        let results = channel(&store)
            .search("password", 2, &Filters::new())
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_unknown_index_is_query_failure() {
        let store = store();
        let err = LexicalChannel::new(Arc::new(store.clone()), "missing")
            .search("password", 5, &Filters::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.failed_channel(), Some(Channel::Bm25));
        assert_eq!(store.open_connections(), 0);
    }
}
