//! # Storyrag Embeddings
//!
//! Client side of the external embedding service. Normalized query text goes
//! in, a dense vector comes out; everything about the model itself lives on
//! the provider.
//!
//! ## Example
//!
//! ```no_run
//! use storyrag_embeddings::{EmbeddingProvider, HttpEmbeddingConfig, HttpEmbeddingProvider};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = HttpEmbeddingProvider::new(HttpEmbeddingConfig::from_env()?)?;
//!     let response = provider.embed("hc-257 password reset").await?;
//!     println!("Got a {}-dimensional vector", response.vector.len());
//!     Ok(())
//! }
//! ```

mod error;
mod provider;

pub use error::EmbeddingError;
pub use provider::EmbeddingProvider;
pub use provider::EmbeddingResponse;
pub use provider::HttpEmbeddingConfig;
pub use provider::HttpEmbeddingProvider;
pub use provider::StaticEmbeddingProvider;

/// Model requested when none is configured
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default request timeout for the HTTP provider
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
