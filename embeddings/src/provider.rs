use crate::error::EmbeddingError;
use crate::{DEFAULT_EMBEDDING_MODEL, DEFAULT_TIMEOUT_MS};
use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of a single embedding request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Dense vector for the submitted text
    pub vector: Vec<f32>,

    /// HTTP status reported by the provider
    pub status: u16,

    /// Optional human-readable message from the provider
    pub message: Option<String>,
}

/// Anything that can turn normalized query text into a dense vector
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, EmbeddingError>;
}

/// Configuration for [`HttpEmbeddingProvider`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEmbeddingConfig {
    /// Base URL of the embedding API, without trailing slash
    pub api_base: String,

    /// Account segment appended to the embedding route
    pub user_email: String,

    /// Optional bearer token
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl HttpEmbeddingConfig {
    pub fn new(api_base: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            user_email: user_email.into(),
            auth_token: None,
            model: default_model(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Build the configuration from `EMBEDDING_*` environment variables.
    pub fn from_env() -> Result<Self, EmbeddingError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EmbeddingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &str| {
            var(name).ok_or_else(|| EmbeddingError::Config(format!("{name} is not set")))
        };

        let mut config = Self::new(
            required("EMBEDDING_API_BASE")?,
            required("EMBEDDING_USER_EMAIL")?,
        );
        if let Some(token) = var("EMBEDDING_AUTH_TOKEN") {
            config = config.with_auth_token(token);
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            config = config.with_model(model);
        }
        if let Some(raw) = var("EMBEDDING_TIMEOUT_MS") {
            config.timeout_ms = raw.parse().map_err(|_| {
                EmbeddingError::Config(format!("EMBEDDING_TIMEOUT_MS is not a number: {raw}"))
            })?;
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/embedding/text/{}",
            self.api_base.trim_end_matches('/'),
            self.user_email
        )
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Embedding provider backed by a remote HTTP API
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    config: HttpEmbeddingConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.api_base.trim().is_empty() {
            return Err(EmbeddingError::Config("api_base must not be empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EmbeddingError::Config(format!("Failed to build HTTP client: {e}")))?;

        info!(
            "Embedding provider configured for {} (model {})",
            config.api_base, config.model
        );

        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        let mut request = self
            .client
            .post(self.config.endpoint())
            .json(&EmbeddingRequest {
                input: text,
                model: &self.config.model,
            });
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("Embedding provider responded with {status}");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }

        let envelope: EmbeddingEnvelope = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        let vector = envelope
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("response contained no embedding".to_string())
            })?;

        Ok(EmbeddingResponse {
            vector,
            status: status.as_u16(),
            message: envelope.message,
        })
    }
}

/// Pull a readable message out of an error body, falling back to the raw text.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Deterministic provider serving vectors from a fixed table.
///
/// Used by tests and offline runs where no embedding API is reachable.
#[derive(Debug, Clone, Default)]
pub struct StaticEmbeddingProvider {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Option<Vec<f32>>,
    failure: Option<(u16, String)>,
}

impl StaticEmbeddingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), vector);
        self
    }

    /// Vector returned for any text without an explicit entry
    pub fn with_fallback(mut self, vector: Vec<f32>) -> Self {
        self.fallback = Some(vector);
        self
    }

    /// Provider that answers every request with the given non-success status
    pub fn failing(status: u16, message: impl Into<String>) -> Self {
        Self {
            failure: Some((status, message.into())),
            ..Self::default()
        }
    }
}

#[async_trait]
impl EmbeddingProvider for StaticEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse, EmbeddingError> {
        if let Some((status, message)) = &self.failure {
            return Err(EmbeddingError::Provider {
                status: *status,
                message: message.clone(),
            });
        }

        let vector = self
            .vectors
            .get(text)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| EmbeddingError::Provider {
                status: 404,
                message: format!("no embedding registered for '{text}'"),
            })?;

        Ok(EmbeddingResponse {
            vector,
            status: 200,
            message: None,
        })
    }
}
