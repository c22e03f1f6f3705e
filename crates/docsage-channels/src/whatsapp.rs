//! WhatsApp Business Cloud API channel.
//!
//! Uses the official WhatsApp Business Platform (Cloud API) for messaging.
//! Requires: Access Token + Phone Number ID from Meta Business Suite.
//! Incoming messages arrive as webhook POSTs handled by the gateway;
//! [`parse_webhook`] normalizes them into [`InboundMessage`]s.

use async_trait::async_trait;
use serde_json::{Value, json};

use docsage_core::config::WhatsAppConfig;
use docsage_core::error::{DocSageError, Result};
use docsage_core::traits::OutboundMessenger;
use docsage_core::types::{ButtonMenu, InboundKind, InboundMessage, ListMenu};

/// Normalize a webhook delivery payload into one inbound message.
///
/// Returns `None` for anything outside the recognized shape — the caller
/// ignores such events silently and answers not-found.
pub fn parse_webhook(payload: &Value) -> Option<InboundMessage> {
    payload.get("object")?;
    let value = payload
        .get("entry")?
        .get(0)?
        .get("changes")?
        .get(0)?
        .get("value")?;
    let msg = value.get("messages")?.get(0)?;
    let from = msg.get("from")?.as_str()?.to_string();
    let wa_id = value
        .get("contacts")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("wa_id"))
        .and_then(|v| v.as_str())
        .unwrap_or(&from)
        .to_string();

    let kind = match msg.get("type")?.as_str()? {
        "text" => InboundKind::Text {
            body: msg.get("text")?.get("body")?.as_str()?.to_string(),
        },
        "interactive" => {
            let interactive = msg.get("interactive")?;
            if let Some(reply) = interactive.get("list_reply") {
                InboundKind::ListReply {
                    id: reply.get("id")?.as_str()?.to_string(),
                    title: reply.get("title")?.as_str()?.to_string(),
                }
            } else if let Some(reply) = interactive.get("button_reply") {
                InboundKind::ButtonReply {
                    id: reply.get("id")?.as_str()?.to_string(),
                    title: reply.get("title")?.as_str()?.to_string(),
                }
            } else {
                return None;
            }
        }
        _ => return None,
    };

    Some(InboundMessage { from, wa_id, kind })
}

/// Plain text reply payload.
fn text_payload(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": { "preview_url": false, "body": body }
    })
}

/// Interactive list menu payload.
fn list_payload(to: &str, menu: &ListMenu) -> Value {
    let mut interactive = json!({
        "type": "list",
        "header": { "type": "text", "text": menu.header },
        "body": { "text": menu.body },
        "action": {
            "button": menu.button,
            "sections": [{
                "rows": menu.rows.iter()
                    .map(|r| json!({ "id": r.id, "title": r.title }))
                    .collect::<Vec<_>>()
            }]
        }
    });
    if let Some(footer) = &menu.footer {
        interactive["footer"] = json!({ "text": footer });
    }
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "interactive",
        "interactive": interactive
    })
}

/// Interactive reply-button menu payload.
fn button_payload(to: &str, menu: &ButtonMenu) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "button",
            "body": { "text": menu.body },
            "action": {
                "buttons": menu.buttons.iter()
                    .map(|b| json!({
                        "type": "reply",
                        "reply": { "id": b.id, "title": b.title }
                    }))
                    .collect::<Vec<_>>()
            }
        }
    })
}

/// WhatsApp Business channel implementation.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Result<Self> {
        if config.access_token.is_empty() {
            return Err(DocSageError::Config("WhatsApp access_token not configured".into()));
        }
        if config.phone_number_id.is_empty() {
            return Err(DocSageError::Config("WhatsApp phone_number_id not configured".into()));
        }
        Ok(Self { config, client: reqwest::Client::new() })
    }

    async fn post_message(&self, body: &Value) -> Result<()> {
        let url = format!(
            "https://graph.facebook.com/v18.0/{}/messages",
            self.config.phone_number_id
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.access_token))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DocSageError::Channel(format!("WhatsApp API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DocSageError::Channel(format!(
                "WhatsApp API error {status}: {error_text}"
            )));
        }

        tracing::debug!("WhatsApp message sent → {}", body["to"].as_str().unwrap_or("?"));
        Ok(())
    }
}

#[async_trait]
impl OutboundMessenger for WhatsAppChannel {
    async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        self.post_message(&text_payload(to, body)).await
    }

    async fn send_list(&self, to: &str, menu: &ListMenu) -> Result<()> {
        self.post_message(&list_payload(to, menu)).await
    }

    async fn send_buttons(&self, to: &str, menu: &ButtonMenu) -> Result<()> {
        self.post_message(&button_payload(to, menu)).await
    }
}
