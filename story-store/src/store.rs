use crate::error::StoreError;
use crate::record::{ScoredStory, StoryDocument};
use crate::text::{Bm25Scorer, FuzzyOptions};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

/// Index and field names the store serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Name of the approximate nearest-neighbour index
    #[serde(default = "default_vector_index")]
    pub vector_index: String,

    /// Field holding stored embeddings
    #[serde(default = "default_embedding_path")]
    pub embedding_path: String,

    /// Name of the full-text index
    #[serde(default = "default_text_index")]
    pub text_index: String,
}

fn default_vector_index() -> String {
    "vector_index".to_string()
}

fn default_embedding_path() -> String {
    "embedding".to_string()
}

fn default_text_index() -> String {
    "bm25_index".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            vector_index: default_vector_index(),
            embedding_path: default_embedding_path(),
            text_index: default_text_index(),
        }
    }
}

/// Nearest-neighbour query over stored embeddings
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub index: String,
    pub path: String,
    pub query_vector: Vec<f32>,
    /// Candidate pool the index ranks before cutting to `limit`
    pub num_candidates: usize,
    pub limit: usize,
}

/// Full-text relevance query
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    pub index: String,
    pub query: String,
    pub paths: Vec<String>,
    pub fuzzy: FuzzyOptions,
}

/// Opens connections to a document store
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;
}

/// One open connection; callers must `close` it when done
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Documents nearest to the query vector, best first, scored in `[0, 1]`
    async fn vector_search(&self, query: &VectorQuery) -> Result<Vec<ScoredStory>, StoreError>;

    /// Documents matching the text query, best first, with BM25 scores
    async fn text_search(&self, query: &TextQuery) -> Result<Vec<ScoredStory>, StoreError>;

    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}

struct Shared {
    config: StoreConfig,
    documents: RwLock<Vec<StoryDocument>>,
    open_connections: AtomicUsize,
    closed_connections: AtomicUsize,
    reachable: AtomicBool,
}

/// In-memory story collection shared by every connection it hands out
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_documents(config, Vec::new())
    }

    pub fn with_documents(config: StoreConfig, documents: Vec<StoryDocument>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                documents: RwLock::new(documents),
                open_connections: AtomicUsize::new(0),
                closed_connections: AtomicUsize::new(0),
                reachable: AtomicBool::new(true),
            }),
        }
    }

    /// Load a JSON array of stories from disk
    pub async fn load(path: &Path, config: StoreConfig) -> Result<Self, StoreError> {
        let documents = load_documents(path).await?;
        info!("Loaded {} stories from {}", documents.len(), path.display());
        Ok(Self::with_documents(config, documents))
    }

    /// Persist the collection as a JSON array
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let documents = self.shared.documents.read().await;
        let content = serde_json::to_vec_pretty(&*documents)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub async fn add_documents(&self, documents: Vec<StoryDocument>) {
        if documents.is_empty() {
            return;
        }
        info!("Adding {} stories to store", documents.len());
        self.shared.documents.write().await.extend(documents);
    }

    pub async fn count(&self) -> usize {
        self.shared.documents.read().await.len()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    /// Simulate the store going away (or coming back)
    pub fn set_reachable(&self, reachable: bool) {
        self.shared.reachable.store(reachable, AtomicOrdering::SeqCst);
    }

    /// Connections handed out and not yet released
    pub fn open_connections(&self) -> usize {
        self.shared.open_connections.load(AtomicOrdering::SeqCst)
    }

    /// Connections released through an explicit `close`
    pub fn closed_connections(&self) -> usize {
        self.shared.closed_connections.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MemoryStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        if !self.shared.reachable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Connection(
                "in-memory store is marked unreachable".to_string(),
            ));
        }
        self.shared.open_connections.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            released: false,
        }))
    }
}

/// Store backed by a JSON file that is read on every connect
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    config: StoreConfig,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, config: StoreConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConnectionFactory for JsonFileStore {
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let documents = match load_documents(&self.path).await {
            Ok(documents) => documents,
            Err(StoreError::Io(e)) => {
                return Err(StoreError::Connection(format!(
                    "cannot open {}: {e}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e),
        };
        debug!(
            "Opened {} ({} stories)",
            self.path.display(),
            documents.len()
        );
        MemoryStore::with_documents(self.config.clone(), documents)
            .connect()
            .await
    }
}

async fn load_documents(path: &Path) -> Result<Vec<StoryDocument>, StoreError> {
    let content = tokio::fs::read(path).await?;
    let documents: Vec<StoryDocument> = serde_json::from_slice(&content)?;
    Ok(documents)
}

struct MemoryConnection {
    shared: Arc<Shared>,
    released: bool,
}

impl MemoryConnection {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.shared
                .open_connections
                .fetch_sub(1, AtomicOrdering::SeqCst);
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if !self.released {
            warn!("Store connection dropped without close");
            self.release();
        }
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn vector_search(&self, query: &VectorQuery) -> Result<Vec<ScoredStory>, StoreError> {
        let config = &self.shared.config;
        if query.index != config.vector_index {
            return Err(StoreError::Query(format!(
                "unknown vector index '{}'",
                query.index
            )));
        }
        if query.path != config.embedding_path {
            return Err(StoreError::Query(format!(
                "field '{}' is not indexed for vector search (expected '{}')",
                query.path, config.embedding_path
            )));
        }
        if query.query_vector.is_empty() {
            return Err(StoreError::Query("query vector is empty".to_string()));
        }
        if query.limit > query.num_candidates {
            return Err(StoreError::Query(format!(
                "limit ({}) cannot exceed numCandidates ({})",
                query.limit, query.num_candidates
            )));
        }

        let documents = self.shared.documents.read().await;
        let mut scored = Vec::new();
        for document in documents.iter().filter(|d| !d.embedding.is_empty()) {
            if document.embedding.len() != query.query_vector.len() {
                return Err(StoreError::Query(format!(
                    "embedding dimension mismatch: query has {}, story {} has {}",
                    query.query_vector.len(),
                    document.key,
                    document.embedding.len()
                )));
            }
            let similarity = cosine_similarity(&query.query_vector, &document.embedding);
            scored.push((document, (1.0 + similarity) / 2.0));
        }

        sort_descending(&mut scored);
        scored.truncate(query.num_candidates);
        scored.truncate(query.limit);

        debug!("Vector search returned {} stories", scored.len());
        Ok(scored
            .into_iter()
            .map(|(document, score)| ScoredStory::new(document.without_embedding(), score))
            .collect())
    }

    async fn text_search(&self, query: &TextQuery) -> Result<Vec<ScoredStory>, StoreError> {
        if query.index != self.shared.config.text_index {
            return Err(StoreError::Query(format!(
                "unknown text index '{}'",
                query.index
            )));
        }
        if query.paths.is_empty() {
            return Err(StoreError::Query(
                "text search needs at least one field".to_string(),
            ));
        }

        let documents = self.shared.documents.read().await;
        let refs: Vec<&StoryDocument> = documents.iter().collect();
        let scores = Bm25Scorer::new(&refs, &query.paths).score(&query.query, &query.fuzzy);

        let mut scored: Vec<(&StoryDocument, f32)> = refs
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .collect();
        sort_descending(&mut scored);

        debug!("Text search returned {} stories", scored.len());
        Ok(scored
            .into_iter()
            .map(|(document, score)| ScoredStory::new(document.without_embedding(), score))
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        this.release();
        this.shared
            .closed_connections
            .fetch_add(1, AtomicOrdering::SeqCst);
        Ok(())
    }
}

/// Stable descending sort; NaN scores sink to the end.
fn sort_descending(scored: &mut [(&StoryDocument, f32)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stories() -> Vec<StoryDocument> {
        vec![
            StoryDocument::new("1", "HC-1", "Reset password via email")
                .with_embedding(vec![1.0, 0.0]),
            StoryDocument::new("2", "HC-2", "Login with single sign-on")
                .with_embedding(vec![0.0, 1.0]),
            StoryDocument::new("3", "HC-3", "Password policy settings")
                .with_embedding(vec![0.7, 0.7]),
            StoryDocument::new("4", "HC-4", "Unembedded draft story"),
        ]
    }

    fn vector_query(vector: Vec<f32>, limit: usize) -> VectorQuery {
        VectorQuery {
            index: "vector_index".to_string(),
            path: "embedding".to_string(),
            query_vector: vector,
            num_candidates: 100,
            limit,
        }
    }

    fn text_query(query: &str) -> TextQuery {
        TextQuery {
            index: "bm25_index".to_string(),
            query: query.to_string(),
            paths: vec!["key".to_string(), "summary".to_string()],
            fuzzy: FuzzyOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_similarity() {
        let store = MemoryStore::with_documents(StoreConfig::default(), stories());
        let conn = store.connect().await.unwrap();

        let results = conn.vector_search(&vector_query(vec![1.0, 0.0], 2)).await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.key, "HC-1");
        assert_eq!(results[1].document.key, "HC-3");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results[0].document.embedding.is_empty());
    }

    #[tokio::test]
    async fn test_vector_search_rejects_misconfigured_index() {
        let store = MemoryStore::with_documents(StoreConfig::default(), stories());
        let conn = store.connect().await.unwrap();

        let mut query = vector_query(vec![1.0, 0.0], 2);
        query.index = "missing".to_string();
        assert!(matches!(conn.vector_search(&query).await, Err(StoreError::Query(_))));

        let mut query = vector_query(vec![1.0, 0.0], 2);
        query.path = "vector".to_string();
        assert!(matches!(conn.vector_search(&query).await, Err(StoreError::Query(_))));

        let query = vector_query(vec![1.0, 0.0, 0.0], 2);
        assert!(matches!(conn.vector_search(&query).await, Err(StoreError::Query(_))));

        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_text_search_fuzzy_and_positive_scores_only() {
        let store = MemoryStore::with_documents(StoreConfig::default(), stories());
        let conn = store.connect().await.unwrap();

        let results = conn.text_search(&text_query("pasword")).await.unwrap();
        conn.close().await.unwrap();

        let keys: Vec<&str> = results.iter().map(|r| r.document.key.as_str()).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"HC-1"));
        assert!(keys.contains(&"HC-3"));
        assert!(results.iter().all(|r| r.score > 0.0));
    }

    #[tokio::test]
    async fn test_text_search_rejects_unknown_index_and_empty_paths() {
        let store = MemoryStore::with_documents(StoreConfig::default(), stories());
        let conn = store.connect().await.unwrap();

        let mut query = text_query("password");
        query.index = "other".to_string();
        assert!(matches!(conn.text_search(&query).await, Err(StoreError::Query(_))));

        let mut query = text_query("password");
        query.paths.clear();
        assert!(matches!(conn.text_search(&query).await, Err(StoreError::Query(_))));

        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_accounting() {
        let store = MemoryStore::new(StoreConfig::default());

        let first = store.connect().await.unwrap();
        let second = store.connect().await.unwrap();
        assert_eq!(store.open_connections(), 2);

        first.close().await.unwrap();
        drop(second);

        assert_eq!(store.open_connections(), 0);
        assert_eq!(store.closed_connections(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let store = MemoryStore::new(StoreConfig::default());
        store.set_reachable(false);

        assert!(matches!(store.connect().await, Err(StoreError::Connection(_))));
        assert_eq!(store.open_connections(), 0);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![1.0, 2.0, 3.0];
        let c = vec![-1.0, -2.0, -3.0];

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);
        assert!((cosine_similarity(&a, &c) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }
}
