use thiserror::Error;

/// Errors that can occur while requesting an embedding
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider answered with a non-success status
    #[error("Embedding provider returned status {status}: {message}")]
    Provider { status: u16, message: String },

    /// The request never produced a response (DNS, TLS, timeout, ...)
    #[error("Failed to reach embedding provider: {0}")]
    Transport(String),

    /// The provider answered 2xx but the body carried no usable vector
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Invalid input provided to the embedding provider
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider configuration is incomplete
    #[error("Invalid embedding configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => EmbeddingError::Provider {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => EmbeddingError::Transport(err.to_string()),
        }
    }
}
