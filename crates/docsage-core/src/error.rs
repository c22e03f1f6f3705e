//! DocSage error taxonomy.
//!
//! Validation failures (`InvalidPayload`, `NotAuthorized`) are typed results
//! reported to the caller. Data errors (`UnknownUser`, `NoActiveDocument`,
//! `NotFound`) are converted into a generic localized message at the outer
//! layer. Everything else is an internal failure that gets logged, never
//! forwarded to the messaging channel.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocSageError>;

#[derive(Debug, Error)]
pub enum DocSageError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The asking user does not own the document set. The answer service
    /// returns this without ever touching the passage index.
    #[error("User does not have access to document set {0}")]
    NotAuthorized(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("No active document set for user {0}")]
    NoActiveDocument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DocSageError {
    /// Data errors get a generic localized fallback message instead of a
    /// technical reply.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            DocSageError::UnknownUser(_)
                | DocSageError::NoActiveDocument(_)
                | DocSageError::NotFound(_)
        )
    }
}
