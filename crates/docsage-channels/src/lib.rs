//! # DocSage Channels
//! Messaging channel implementations. WhatsApp Business Cloud API is the
//! only channel; inbound messages arrive via the gateway webhook and
//! outbound replies go through the Graph API.

pub mod whatsapp;

pub use whatsapp::{WhatsAppChannel, parse_webhook};
