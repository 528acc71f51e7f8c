use thiserror::Error;

/// Errors that can occur during document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or opened
    #[error("Failed to connect to document store: {0}")]
    Connection(String),

    /// The query referenced an index or field the store does not have
    #[error("Invalid query: {0}")]
    Query(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
