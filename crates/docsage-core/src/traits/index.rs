//! Passage index seam — an external keyed-similarity-search service.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PassageMatch, PassageVector};

/// Opaque vector store keyed by chunk id, filterable by document set.
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Upsert a batch of passage vectors.
    async fn upsert(&self, vectors: &[PassageVector]) -> Result<()>;

    /// Nearest-neighbor query scoped to one document set.
    async fn query(
        &self,
        vector: &[f32],
        document_set_id: &str,
        top_k: usize,
    ) -> Result<Vec<PassageMatch>>;

    /// Delete all vectors belonging to one document set.
    async fn delete_document_set(&self, document_set_id: &str) -> Result<()>;

    /// Delete every vector in the index.
    async fn delete_all(&self) -> Result<()>;
}
