//! # DocSage Index
//! Client for the external keyed-similarity-search service.
//!
//! The service is opaque: vectors are upserted keyed by chunk id with the
//! passage text and owning document set id as metadata; queries are
//! nearest-neighbor with an equality filter on the document set id.

use async_trait::async_trait;
use serde_json::{Value, json};

use docsage_core::config::IndexConfig;
use docsage_core::error::{DocSageError, Result};
use docsage_core::traits::PassageIndex;
use docsage_core::types::{PassageMatch, PassageVector};

pub struct IndexClient {
    config: IndexConfig,
    api_key: String,
    client: reqwest::Client,
}

impl IndexClient {
    /// Create a client from config. The API key falls back to the
    /// `PASSAGE_INDEX_API_KEY` environment variable when not configured.
    pub fn new(config: IndexConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(DocSageError::Config("index base_url not configured".into()));
        }
        let api_key = if !config.api_key.is_empty() {
            config.api_key.clone()
        } else {
            std::env::var("PASSAGE_INDEX_API_KEY").unwrap_or_default()
        };
        Ok(Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DocSageError::Http(format!("index request failed ({url}): {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DocSageError::Index(format!("index API error {status}: {text}")));
        }
        response
            .json()
            .await
            .map_err(|e| DocSageError::Http(e.to_string()))
    }
}

/// Serialize one vector into the wire shape.
fn vector_body(v: &PassageVector) -> Value {
    json!({
        "id": v.id,
        "values": v.values,
        "metadata": {
            "text": v.text,
            "document_set_id": v.document_set_id,
        }
    })
}

/// Parse the matches array of a query response.
fn parse_matches(json: &Value) -> Vec<PassageMatch> {
    json["matches"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|m| PassageMatch {
                    id: m["id"].as_str().unwrap_or_default().to_string(),
                    score: m["score"].as_f64().unwrap_or(0.0) as f32,
                    text: m["metadata"]["text"].as_str().unwrap_or_default().to_string(),
                    document_set_id: m["metadata"]["document_set_id"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl PassageIndex for IndexClient {
    async fn upsert(&self, vectors: &[PassageVector]) -> Result<()> {
        let body = json!({
            "vectors": vectors.iter().map(vector_body).collect::<Vec<_>>(),
        });
        self.post("/vectors/upsert", &body).await?;
        tracing::debug!("upserted {} vectors", vectors.len());
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        document_set_id: &str,
        top_k: usize,
    ) -> Result<Vec<PassageMatch>> {
        let body = json!({
            "vector": vector,
            "filter": { "document_set_id": { "$eq": document_set_id } },
            "topK": top_k,
            "includeMetadata": true,
        });
        let json = self.post("/query", &body).await?;
        Ok(parse_matches(&json))
    }

    async fn delete_document_set(&self, document_set_id: &str) -> Result<()> {
        let body = json!({
            "filter": { "document_set_id": { "$eq": document_set_id } },
        });
        self.post("/vectors/delete", &body).await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.post("/vectors/delete", &json!({ "deleteAll": true })).await?;
        Ok(())
    }
}
