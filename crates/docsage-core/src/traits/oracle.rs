//! Embedding and completion oracle seams.
//!
//! Both are opaque network services. Embedding calls may be retried by the
//! implementation (bounded backoff); completion calls are issued exactly
//! once and a transient failure propagates to the caller.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, CompletionResponse};

/// Converts text to fixed-length similarity vectors.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Generates text from chat messages.
#[async_trait]
pub trait CompletionOracle: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse>;
}
