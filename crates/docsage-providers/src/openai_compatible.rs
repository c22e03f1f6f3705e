//! Unified OpenAI-compatible oracle client.
//!
//! A single struct that implements both oracle seams against any
//! OpenAI-compatible API, distinguished only by endpoint URL and API key.
//!
//! Retry strategy (embeddings only):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5), bounded by
//!   `max_retries`; exhaustion is a terminal failure.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

use docsage_core::config::OracleConfig;
use docsage_core::error::{DocSageError, Result};
use docsage_core::traits::{CompletionOracle, EmbeddingOracle};
use docsage_core::types::{ChatMessage, CompletionResponse};

pub struct OracleClient {
    config: OracleConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OracleClient {
    /// Create a client from config. The API key falls back to the
    /// `OPENAI_API_KEY` environment variable when not configured.
    pub fn new(config: OracleConfig) -> Result<Self> {
        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("OPENAI_API_KEY").unwrap_or_default()
        };
        if api_key.is_empty() {
            return Err(DocSageError::Config(
                "oracle api_key not configured and OPENAI_API_KEY not set".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocSageError::Http(e.to_string()))?;
        Ok(Self { config, api_key, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DocSageError::Http(format!("oracle connection failed: {e}")))
    }
}

/// Backoff before retry `attempt` (1-based): 1s, 2s, 4s, ... capped at 32s.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(5))
}

/// Extract `data[].embedding` arrays in input order.
pub(crate) fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| DocSageError::Oracle("embedding response missing data array".into()))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| DocSageError::Oracle("embedding response missing embedding".into()))?;
        embeddings.push(
            embedding
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect(),
        );
    }
    Ok(embeddings)
}

/// Extract `choices[0].message.content`.
pub(crate) fn parse_completion_response(json: &Value) -> Result<String> {
    json["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .map(String::from)
        .ok_or_else(|| DocSageError::Oracle("no choices in completion response".into()))
}

#[async_trait]
impl EmbeddingOracle for OracleClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = json!({
            "model": self.config.embed_model,
            "input": texts,
        });

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "embedding attempt {}/{} failed, retrying in {:?}",
                    attempt,
                    self.config.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }

            match self.post_json("/embeddings", &body).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: Value = response
                            .json()
                            .await
                            .map_err(|e| DocSageError::Http(e.to_string()))?;
                        return parse_embedding_response(&json);
                    }

                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(DocSageError::Oracle(format!(
                            "embedding API error {status}: {text}"
                        )));
                        continue;
                    }
                    // Client error — not retryable.
                    return Err(DocSageError::Oracle(format!(
                        "embedding API error {status}: {text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| DocSageError::Oracle("embedding failed after retries".into())))
    }
}

#[async_trait]
impl CompletionOracle for OracleClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse> {
        let body = json!({
            "model": self.config.chat_model,
            "messages": messages,
        });

        let response = self.post_json("/chat/completions", &body).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocSageError::Oracle(format!(
                "completion API error {status}: {text}"
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| DocSageError::Http(e.to_string()))?;
        let content = parse_completion_response(&raw)?;
        Ok(CompletionResponse { content, raw })
    }
}
