//! Batch ingestion pipeline.
//!
//! Order of side effects matters: the Document Set record and chunk
//! descriptors are persisted (status Saved) before any vector write, so a
//! crash mid-pipeline leaves a recoverable record. Only after every batch
//! is embedded and upserted does the set transition to Indexed and join
//! the owner's document list. The steps are not transactional — a failure
//! leaves the set in Saved with partial vectors, detectable by status.

use std::sync::Arc;

use docsage_core::config::IngestConfig;
use docsage_core::error::{DocSageError, Result};
use docsage_core::traits::{EmbeddingOracle, PassageIndex};
use docsage_core::types::PassageVector;
use docsage_store::{DocumentSetStatus, Store};

use crate::chunker;
use crate::extract;

pub struct Ingestor {
    store: Arc<Store>,
    embedder: Arc<dyn EmbeddingOracle>,
    index: Arc<dyn PassageIndex>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingOracle>,
        index: Arc<dyn PassageIndex>,
        config: IngestConfig,
    ) -> Self {
        Self { store, embedder, index, config }
    }

    /// Ingest one or more PDF blobs as a named document set owned by
    /// `owner_user_id`. Returns the Document Set id.
    pub async fn ingest(
        &self,
        documents: &[Vec<u8>],
        name: &str,
        owner_user_id: &str,
    ) -> Result<String> {
        let prepared = self.prepare(documents, name, owner_user_id).await?;
        self.index_chunks(prepared).await
    }

    /// Ingest already-extracted text. Split out so the pipeline is
    /// exercisable without PDF fixtures.
    pub async fn ingest_text(&self, text: &str, name: &str, owner_user_id: &str) -> Result<String> {
        let prepared = self.prepare_text(text, name, owner_user_id).await?;
        self.index_chunks(prepared).await
    }

    /// Phase one: extract, chunk, and persist the Saved record with its
    /// chunk descriptors — everything that must exist before any vector
    /// write. Cheap enough to run on a request path.
    pub async fn prepare(
        &self,
        documents: &[Vec<u8>],
        name: &str,
        owner_user_id: &str,
    ) -> Result<PreparedIngest> {
        let text = extract::extract_all(documents)?;
        self.prepare_text(&text, name, owner_user_id).await
    }

    pub async fn prepare_text(
        &self,
        text: &str,
        name: &str,
        owner_user_id: &str,
    ) -> Result<PreparedIngest> {
        let chunks = chunker::split_text(text, self.config.chunk_size, self.config.chunk_overlap);
        if chunks.is_empty() {
            return Err(DocSageError::Ingest("document produced no text".into()));
        }
        let chunk_ids: Vec<String> = chunks.iter().map(|_| chunker::chunk_id()).collect();

        // Re-ingestion of an existing set clears its old vectors first;
        // otherwise start a fresh Saved record.
        let set = match self.store.document_set_by_name(name)? {
            Some(existing) if existing.owner_user_id == owner_user_id => {
                self.index.delete_document_set(&existing.id).await?;
                self.store
                    .set_document_set_status(&existing.id, DocumentSetStatus::Saved)?;
                existing
            }
            _ => self.store.create_document_set(name, owner_user_id)?,
        };
        self.store.replace_chunks(&set.id, &chunk_ids)?;
        Ok(PreparedIngest {
            document_set_id: set.id,
            owner_user_id: owner_user_id.to_string(),
            chunks,
            chunk_ids,
        })
    }

    /// Phase two: embed and upsert in batches, then flip the set to
    /// Indexed and append it to the owner's document list. Long-running —
    /// the embedding retry loop must stay off any per-request deadline.
    pub async fn index_chunks(&self, prepared: PreparedIngest) -> Result<String> {
        let PreparedIngest { document_set_id, owner_user_id, chunks, chunk_ids } = prepared;
        tracing::info!(
            "indexing {}: {} chunks in batches of {}",
            document_set_id,
            chunks.len(),
            self.config.batch_size
        );

        for (batch_texts, batch_ids) in chunks
            .chunks(self.config.batch_size)
            .zip(chunk_ids.chunks(self.config.batch_size))
        {
            let embeddings = self.embedder.embed(batch_texts).await?;
            if embeddings.len() != batch_texts.len() {
                return Err(DocSageError::Ingest(format!(
                    "embedding count mismatch: {} texts, {} vectors",
                    batch_texts.len(),
                    embeddings.len()
                )));
            }
            let vectors: Vec<PassageVector> = batch_ids
                .iter()
                .zip(batch_texts.iter().zip(embeddings))
                .map(|(id, (text, values))| PassageVector {
                    id: id.clone(),
                    values,
                    text: text.clone(),
                    document_set_id: document_set_id.clone(),
                })
                .collect();
            self.index.upsert(&vectors).await?;
        }

        self.store
            .set_document_set_status(&document_set_id, DocumentSetStatus::Indexed)?;
        self.store.append_user_document(&owner_user_id, &document_set_id)?;
        tracing::info!("document set {} indexed", document_set_id);
        Ok(document_set_id)
    }
}

/// Output of the preparation phase: the Saved record exists, vectors do not.
pub struct PreparedIngest {
    pub document_set_id: String,
    owner_user_id: String,
    chunks: Vec<String>,
    chunk_ids: Vec<String>,
}
