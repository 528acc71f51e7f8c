//! # Storyrag Store
//!
//! Document store for user stories. It serves the two search stages the
//! retrieval engine needs: nearest-neighbour search over stored embeddings
//! and BM25 full-text search with typo tolerance. Callers obtain a
//! connection from a [`ConnectionFactory`] per operation and close it
//! when done.
//!
//! ## Example
//!
//! ```no_run
//! use storyrag_store::{ConnectionFactory, FuzzyOptions, JsonFileStore, StoreConfig, TextQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = JsonFileStore::new("stories.json", StoreConfig::default());
//!     let conn = store.connect().await?;
//!     let hits = conn
//!         .text_search(&TextQuery {
//!             index: "bm25_index".to_string(),
//!             query: "password reset".to_string(),
//!             paths: vec!["key".to_string(), "summary".to_string()],
//!             fuzzy: FuzzyOptions::default(),
//!         })
//!         .await;
//!     conn.close().await?;
//!     println!("Found {} stories", hits?.len());
//!     Ok(())
//! }
//! ```

mod error;
mod record;
mod store;
mod text;

pub use error::StoreError;
pub use record::{Filters, ScoredStory, StoryDocument, active_filters, filter_value_matches};
pub use store::{
    ConnectionFactory, JsonFileStore, MemoryStore, StoreConfig, StoreConnection, TextQuery,
    VectorQuery,
};
pub use text::{Bm25Scorer, FuzzyOptions, fuzzy_distance, tokenize};
