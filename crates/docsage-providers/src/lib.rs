//! # DocSage Providers
//! HTTP clients for the embedding and completion oracles.
//!
//! Both oracles sit behind one OpenAI-compatible API. Embedding calls are
//! retried with bounded exponential backoff; completion calls are issued
//! exactly once.

pub mod openai_compatible;

pub use openai_compatible::OracleClient;
