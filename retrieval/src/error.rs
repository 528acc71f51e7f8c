use crate::candidate::Channel;
use storyrag_embeddings::EmbeddingError;
use storyrag_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{channel} search failed: {source}")]
    Channel {
        channel: Channel,
        #[source]
        source: StoreError,
    },

    #[error("{channel} search timed out after {timeout_ms}ms")]
    Timeout { channel: Channel, timeout_ms: u64 },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Invalid retrieval configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse failure category, independent of which layer raised it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Connection,
    Query,
    Provider,
    Timeout,
    Config,
}

impl RetrievalError {
    pub(crate) fn channel(channel: Channel, source: StoreError) -> Self {
        RetrievalError::Channel { channel, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrievalError::Validation(_) => ErrorKind::Validation,
            RetrievalError::Channel { source, .. } => match source {
                StoreError::Connection(_) | StoreError::Io(_) => ErrorKind::Connection,
                StoreError::Query(_) | StoreError::Serialization(_) => ErrorKind::Query,
            },
            RetrievalError::Timeout { .. } => ErrorKind::Timeout,
            RetrievalError::Embedding(err) => match err {
                EmbeddingError::InvalidInput(_) => ErrorKind::Validation,
                EmbeddingError::Config(_) => ErrorKind::Config,
                EmbeddingError::Provider { .. }
                | EmbeddingError::Transport(_)
                | EmbeddingError::InvalidResponse(_) => ErrorKind::Provider,
            },
            RetrievalError::InvalidConfig(_) => ErrorKind::Config,
        }
    }

    /// Channel that failed, when the failure came from a search channel
    pub fn failed_channel(&self) -> Option<Channel> {
        match self {
            RetrievalError::Channel { channel, .. } | RetrievalError::Timeout { channel, .. } => {
                Some(*channel)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
