//! Plain-text extraction from uploaded document blobs.
//!
//! PDF is the only supported source format; extraction returns trimmed
//! UTF-8 text or an error the pipeline surfaces as an ingestion failure.

use docsage_core::error::{DocSageError, Result};

/// Extract plain text from one PDF blob.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DocSageError::Ingest(format!("PDF extraction failed: {e}")))?;
    Ok(text.trim().to_string())
}

/// Extract every blob in input order and join with a single space.
pub fn extract_all(documents: &[Vec<u8>]) -> Result<String> {
    if documents.is_empty() {
        return Err(DocSageError::Ingest("no documents provided".into()));
    }
    let mut texts = Vec::with_capacity(documents.len());
    for doc in documents {
        texts.push(extract_pdf(doc)?);
    }
    Ok(texts.join(" "))
}
