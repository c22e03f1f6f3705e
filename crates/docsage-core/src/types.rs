//! Shared message, menu, and passage types.

use serde::{Deserialize, Serialize};

/// Chat message role for the completion oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// Completion oracle response: extracted text plus the raw response body
/// (persisted verbatim on the Q&A log).
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub raw: serde_json::Value,
}

/// One passage vector to upsert into the index. The document set id is the
/// metadata filter key used at query time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageVector {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
    pub document_set_id: String,
}

/// One nearest-neighbor match from the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageMatch {
    pub id: String,
    pub score: f32,
    pub text: String,
    pub document_set_id: String,
}

/// A normalized inbound message from the messaging channel.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Sender phone number (`messages[0].from`).
    pub from: String,
    /// Channel-native identity (`contacts[0].wa_id`).
    pub wa_id: String,
    pub kind: InboundKind,
}

/// Structural shape of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    Text { body: String },
    ListReply { id: String, title: String },
    ButtonReply { id: String, title: String },
}

/// One selectable row in a list or button menu. The `id` carries a tagged
/// action so dispatch never depends on translated prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuRow {
    pub id: String,
    pub title: String,
}

impl MenuRow {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into() }
    }
}

/// An interactive list menu (header + body + one button opening the rows).
#[derive(Debug, Clone, PartialEq)]
pub struct ListMenu {
    pub header: String,
    pub body: String,
    pub footer: Option<String>,
    pub button: String,
    pub rows: Vec<MenuRow>,
}

/// An interactive reply-button menu (at most three buttons on WhatsApp).
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonMenu {
    pub body: String,
    pub buttons: Vec<MenuRow>,
}
