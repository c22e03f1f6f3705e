//! # DocSage Ingest
//! Turns raw document blobs into searchable, attributable passage vectors:
//! extract text, split into overlapping chunks, embed in batches, upsert
//! into the passage index, and record the Document Set lifecycle.

pub mod chunker;
pub mod extract;
pub mod pipeline;

pub use pipeline::{Ingestor, PreparedIngest};
