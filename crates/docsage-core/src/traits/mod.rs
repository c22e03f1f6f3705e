//! Trait seams for external collaborators.

pub mod index;
pub mod oracle;
pub mod outbound;

pub use index::PassageIndex;
pub use oracle::{CompletionOracle, EmbeddingOracle};
pub use outbound::OutboundMessenger;
