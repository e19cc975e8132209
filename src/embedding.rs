//! Embedding gateway abstraction and implementations.
//!
//! Defines the [`EmbeddingGateway`] trait and concrete backends:
//! - **[`OllamaEmbedding`]** — calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`OpenAiEmbedding`]** — calls the OpenAI embeddings API.
//!
//! Use [`create_gateway`] to instantiate the backend named by the
//! configuration. The gateway is injected into the orchestrator at
//! construction time; swapping backends means implementing the trait, not
//! touching the pipeline.
//!
//! Backend failures surface as [`RagError::EmbeddingUnavailable`] so the
//! caller can treat them as retryable. Nothing here retries on its own.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Maps text to fixed-length float vectors.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl std::fmt::Debug for dyn EmbeddingGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGateway")
            .field("model_name", &self.model_name())
            .finish()
    }
}

/// Embed a single query text.
pub async fn embed_query(gateway: &dyn EmbeddingGateway, text: &str) -> Result<Vec<f32>> {
    let results = gateway.embed(&[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| RagError::EmbeddingUnavailable("empty embedding response".to_string()))
}

/// Create the [`EmbeddingGateway`] named by the configuration.
pub fn create_gateway(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingGateway>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaEmbedding::new(config)?)),
        "openai" => Ok(Box::new(OpenAiEmbedding::new(config)?)),
        other => Err(RagError::Validation(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Ollama ============

/// Embedding gateway backed by a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default
/// `http://localhost:11434`). Requires an embedding model to be pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedding {
    model: String,
    dims: usize,
    url: String,
    client: reqwest::Client,
}

impl OllamaEmbedding {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            client,
        })
    }
}

#[async_trait]
impl EmbeddingGateway for OllamaEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::EmbeddingUnavailable(format!(
                    "connection to Ollama at {} failed: {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingUnavailable(format!(
                "Ollama embed error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            RagError::EmbeddingUnavailable(
                "invalid Ollama response: missing embeddings array".to_string(),
            )
        })?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| {
                RagError::EmbeddingUnavailable(
                    "invalid Ollama response: embedding is not an array".to_string(),
                )
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

// ============ OpenAI ============

/// Embedding gateway using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAiEmbedding {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbedding {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Validation("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingUnavailable(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        RagError::EmbeddingUnavailable("invalid OpenAI response: missing data array".to_string())
    })?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                RagError::EmbeddingUnavailable(
                    "invalid OpenAI response: missing embedding".to_string(),
                )
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "chroma".to_string(),
            ..EmbeddingConfig::default()
        };
        let err = create_gateway(&config).unwrap_err();
        assert!(matches!(err, RagError::Validation(_)));
    }

    #[test]
    fn ollama_gateway_reports_model_and_dims() {
        let config = EmbeddingConfig::default();
        let gateway = OllamaEmbedding::new(&config).unwrap();
        assert_eq!(gateway.model_name(), "nomic-embed-text");
        assert_eq!(gateway.dims(), 768);
    }

    #[test]
    fn parse_ollama_embeddings() {
        let json = serde_json::json!({
            "embeddings": [[1.0, 2.0], [3.0, 4.0]]
        });
        let parsed = parse_ollama_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    }

    #[test]
    fn parse_ollama_rejects_missing_array() {
        let json = serde_json::json!({ "error": "model not found" });
        assert!(parse_ollama_response(&json).is_err());
    }

    #[test]
    fn parse_openai_embeddings() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.5, -0.5] },
                { "embedding": [1.5, 2.5] }
            ]
        });
        let parsed = parse_openai_response(&json).unwrap();
        assert_eq!(parsed, vec![vec![0.5, -0.5], vec![1.5, 2.5]]);
    }

    #[test]
    fn parse_openai_rejects_malformed_item() {
        let json = serde_json::json!({ "data": [ { "index": 0 } ] });
        assert!(parse_openai_response(&json).is_err());
    }
}
