//! API route handlers for the gateway.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use docsage_channels::parse_webhook;
use docsage_core::error::DocSageError;

use crate::server::AppState;

/// Root endpoint.
pub async fn root() -> &'static str {
    "Welcome to the webhook"
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "docsage-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Verification handshake logic: echo the challenge only for a subscribe
/// request carrying the configured token.
pub fn verify_subscription(
    params: &HashMap<String, String>,
    expected_token: &str,
) -> Option<String> {
    let mode = params.get("hub.mode")?;
    let token = params.get("hub.verify_token")?;
    let challenge = params.get("hub.challenge")?;
    (mode == "subscribe" && token == expected_token).then(|| challenge.clone())
}

/// WhatsApp webhook verification (GET) — Meta sends this to verify the
/// endpoint.
pub async fn webhook_verify(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let expected = state
        .config
        .channel
        .whatsapp
        .as_ref()
        .map(|w| w.webhook_verify_token.clone())
        .unwrap_or_default();

    match verify_subscription(&params, &expected) {
        Some(challenge) => {
            tracing::info!("webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
    }
}

/// WhatsApp webhook delivery (POST). The channel expects a quick ack, so
/// the turn runs on a detached task; unrecognized payloads answer 404.
pub async fn webhook_receive(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> StatusCode {
    match parse_webhook(&body) {
        None => StatusCode::NOT_FOUND,
        Some(msg) => {
            let engine = state.engine.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.handle_message(&msg).await {
                    tracing::error!("webhook turn for {} failed: {e}", msg.wa_id);
                }
            });
            StatusCode::OK
        }
    }
}

#[derive(Deserialize)]
pub struct CreateUserBody {
    #[serde(default)]
    pub name: String,
    pub mobile: String,
    #[serde(default)]
    pub email: String,
}

/// Create a user, or return the existing one with the same email.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateUserBody>,
) -> Json<Value> {
    match state.store.create_user(&body.name, &body.mobile, &body.email) {
        Ok(user) => Json(json!({
            "ok": true,
            "user": {
                "id": user.id,
                "name": user.name,
                "mobile": user.mobile,
                "email": user.email,
            }
        })),
        Err(e) => {
            tracing::error!("create_user failed: {e}");
            Json(json!({"ok": false, "error": "could not create user"}))
        }
    }
}

#[derive(Deserialize)]
pub struct UploadBody {
    pub user_id: String,
    pub name: String,
    /// Base64-encoded PDF blobs, in order.
    pub documents: Vec<String>,
}

/// Decode the upload body's base64 blobs.
pub fn decode_documents(encoded: &[String]) -> Result<Vec<Vec<u8>>, base64::DecodeError> {
    encoded
        .iter()
        .map(|doc| base64::engine::general_purpose::STANDARD.decode(doc))
        .collect()
}

/// Upload documents for ingestion. The Saved record is created on the
/// request path; embedding and upserting run detached, since the retry
/// loop must never sit on a per-request deadline.
pub async fn upload_documents(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UploadBody>,
) -> Json<Value> {
    if body.documents.is_empty() {
        return Json(json!({"ok": false, "error": "no documents provided"}));
    }
    match state.store.user_by_id(&body.user_id) {
        Ok(Some(_)) => {}
        _ => return Json(json!({"ok": false, "error": "unknown user"})),
    }

    let blobs = match decode_documents(&body.documents) {
        Ok(blobs) => blobs,
        Err(e) => {
            return Json(json!({"ok": false, "error": format!("invalid base64 document: {e}")}));
        }
    };

    let prepared = match state.ingestor.prepare(&blobs, &body.name, &body.user_id).await {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!("ingestion prepare failed: {e}");
            return Json(json!({"ok": false, "error": "ingestion failed"}));
        }
    };

    let document_set_id = prepared.document_set_id.clone();
    let ingestor = state.ingestor.clone();
    tokio::spawn(async move {
        match ingestor.index_chunks(prepared).await {
            Ok(id) => tracing::info!("ingestion finished for document set {id}"),
            // The set stays Saved — detectable, re-ingestable.
            Err(e) => tracing::error!("ingestion aborted: {e}"),
        }
    });

    Json(json!({
        "ok": true,
        "document_set_id": document_set_id,
        "status": "Saved",
    }))
}

#[derive(Deserialize)]
pub struct AskBody {
    pub user_id: String,
    pub question: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// The document-question API: synthesized answer or authorization error.
pub async fn ask_question(
    Path(document_set_id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskBody>,
) -> Json<Value> {
    let language = match body.language {
        Some(language) => language,
        None => state
            .store
            .user_by_id(&body.user_id)
            .ok()
            .flatten()
            .and_then(|u| u.language_id)
            .and_then(|id| state.store.language(&id).ok().flatten())
            .map(|l| l.name)
            .unwrap_or_else(|| state.config.conversation.base_language.clone()),
    };

    match state
        .engine
        .answers()
        .answer(&document_set_id, &body.question, &body.user_id, &language)
        .await
    {
        Ok(answer) => Json(json!({"ok": true, "answer": answer})),
        Err(DocSageError::NotAuthorized(_)) => {
            Json(json!({"ok": false, "error": "user does not have such a document"}))
        }
        Err(e) => {
            tracing::error!("ask_question failed: {e}");
            Json(json!({"ok": false, "error": "internal server error"}))
        }
    }
}

/// Admin cleanup: drop every vector of one document set (e.g. an orphaned
/// Saved record from a failed ingestion).
pub async fn delete_document_vectors(
    Path(document_set_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Json<Value> {
    match state.index.delete_document_set(&document_set_id).await {
        Ok(()) => Json(json!({"ok": true})),
        Err(e) => {
            tracing::error!("vector delete failed: {e}");
            Json(json!({"ok": false, "error": "vector delete failed"}))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn params(mode: &str, token: &str, challenge: &str) -> HashMap<String, String> {
        HashMap::from([
            ("hub.mode".to_string(), mode.to_string()),
            ("hub.verify_token".to_string(), token.to_string()),
            ("hub.challenge".to_string(), challenge.to_string()),
        ])
    }

    #[test]
    fn test_verify_subscription_echoes_challenge() {
        let p = params("subscribe", "secret", "12345");
        assert_eq!(verify_subscription(&p, "secret").as_deref(), Some("12345"));
    }

    #[test]
    fn test_verify_subscription_rejects_bad_token_or_mode() {
        assert!(verify_subscription(&params("subscribe", "wrong", "c"), "secret").is_none());
        assert!(verify_subscription(&params("unsubscribe", "secret", "c"), "secret").is_none());
        assert!(verify_subscription(&HashMap::new(), "secret").is_none());
    }

    #[test]
    fn test_decode_documents() {
        let encoded = vec![base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.4 test")];
        let decoded = decode_documents(&encoded).unwrap();
        assert_eq!(decoded[0], b"%PDF-1.4 test");
        assert!(decode_documents(&["not base64!!".to_string()]).is_err());
    }
}
