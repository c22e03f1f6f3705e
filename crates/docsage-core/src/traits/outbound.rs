//! Outbound messaging seam.
//!
//! A dispatched message cannot be cancelled; errors surface to the caller
//! but the engine treats sends as fire-and-forget side effects.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ButtonMenu, ListMenu};

/// Sends structured replies to the messaging channel.
#[async_trait]
pub trait OutboundMessenger: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;
    async fn send_list(&self, to: &str, menu: &ListMenu) -> Result<()>;
    async fn send_buttons(&self, to: &str, menu: &ButtonMenu) -> Result<()>;
}
