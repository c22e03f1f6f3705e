//! # DocSage Gateway
//! HTTP surface: the WhatsApp webhook (verification handshake + message
//! delivery), the document upload and question APIs, and health checks.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
