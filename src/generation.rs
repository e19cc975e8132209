//! Generation gateway abstraction and the Ollama implementation.
//!
//! Defines the [`GenerationGateway`] trait: a complete-answer call, a
//! streaming variant yielding incremental text fragments, and the
//! health/introspection hooks (`is_available`, `list_models`) used for
//! status reporting. [`OllamaGenerator`] talks to a local Ollama instance
//! over `POST /api/chat` (NDJSON lines when streaming) and `GET /api/tags`.
//!
//! Generation failures surface as [`RagError::GenerationUnavailable`] and
//! are never swallowed; the health hooks instead degrade to false/empty so
//! status checks cannot take a request down.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Incremental text fragments from a streaming generation call.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Produces an answer from an assembled prompt.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3.2:3b"`).
    fn model_name(&self) -> &str;

    /// Generate a complete answer.
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Generate an answer as a stream of text fragments.
    async fn generate_stream(&self, system_prompt: &str, user_prompt: &str)
        -> Result<TextStream>;

    /// Whether the backend is reachable. Failures degrade to `false`.
    async fn is_available(&self) -> bool;

    /// Models the backend offers. Failures degrade to an empty list.
    async fn list_models(&self) -> Vec<String>;
}

impl std::fmt::Debug for dyn GenerationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationGateway")
            .field("model_name", &self.model_name())
            .finish()
    }
}

/// Create the [`GenerationGateway`] named by the configuration.
pub fn create_gateway(config: &GenerationConfig) -> Result<Box<dyn GenerationGateway>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => Err(RagError::Validation(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

/// Generation gateway backed by a local Ollama instance.
pub struct OllamaGenerator {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::GenerationUnavailable(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            client,
        })
    }

    fn chat_body(&self, system_prompt: &str, user_prompt: &str, stream: bool) -> serde_json::Value {
        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            messages.push(serde_json::json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": user_prompt }));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        })
    }

    async fn post_chat(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.url))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                RagError::GenerationUnavailable(format!(
                    "connection to Ollama at {} failed: {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::GenerationUnavailable(format!(
                "Ollama chat error {}: {}",
                status, body_text
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationGateway for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let body = self.chat_body(system_prompt, user_prompt, false);
        let response = self.post_chat(&body).await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::GenerationUnavailable(e.to_string()))?;

        json.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                RagError::GenerationUnavailable(
                    "invalid Ollama response: missing message content".to_string(),
                )
            })
    }

    async fn generate_stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<TextStream> {
        let body = self.chat_body(system_prompt, user_prompt, true);
        let response = self.post_chat(&body).await?;
        let bytes = Box::pin(response.bytes_stream());

        // One JSON object per line; fragments arrive under message.content.
        let stream = futures::stream::try_unfold(
            (bytes, String::new()),
            |(mut bytes, mut buf)| async move {
                loop {
                    if let Some(pos) = buf.find('\n') {
                        let line: String = buf.drain(..=pos).collect();
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        if let Some(fragment) = parse_chat_line(line)? {
                            if !fragment.is_empty() {
                                return Ok(Some((fragment, (bytes, buf))));
                            }
                        }
                        continue;
                    }

                    match bytes.next().await {
                        Some(Ok(b)) => buf.push_str(&String::from_utf8_lossy(&b)),
                        Some(Err(e)) => {
                            return Err(RagError::GenerationUnavailable(format!(
                                "stream interrupted: {}",
                                e
                            )))
                        }
                        None => {
                            let line = buf.trim().to_string();
                            buf.clear();
                            if !line.is_empty() {
                                if let Some(fragment) = parse_chat_line(&line)? {
                                    if !fragment.is_empty() {
                                        return Ok(Some((fragment, (bytes, buf))));
                                    }
                                }
                            }
                            return Ok(None);
                        }
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn list_models(&self) -> Vec<String> {
        let response = match self.client.get(format!("{}/api/tags", self.url)).send().await {
            Ok(r) if r.status().is_success() => r,
            _ => return Vec::new(),
        };

        let json: serde_json::Value = match response.json().await {
            Ok(j) => j,
            Err(_) => return Vec::new(),
        };

        json.get("models")
            .and_then(|m| m.as_array())
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("name").and_then(|n| n.as_str()))
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse one NDJSON line from a streaming chat response. Returns the text
/// fragment it carries, if any.
fn parse_chat_line(line: &str) -> Result<Option<String>> {
    let json: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| RagError::GenerationUnavailable(format!("invalid stream line: {}", e)))?;

    if let Some(err) = json.get("error").and_then(|e| e.as_str()) {
        return Err(RagError::GenerationUnavailable(err.to_string()));
    }

    Ok(json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string()))
}
