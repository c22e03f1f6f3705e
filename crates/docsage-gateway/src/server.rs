//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use docsage_channels::WhatsAppChannel;
use docsage_core::config::DocSageConfig;
use docsage_core::error::DocSageError;
use docsage_core::traits::{CompletionOracle, EmbeddingOracle, OutboundMessenger, PassageIndex};
use docsage_engine::Engine;
use docsage_index::IndexClient;
use docsage_ingest::Ingestor;
use docsage_providers::OracleClient;
use docsage_store::Store;

use crate::routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub config: DocSageConfig,
    pub store: Arc<Store>,
    pub engine: Arc<Engine>,
    pub ingestor: Arc<Ingestor>,
    pub index: Arc<dyn PassageIndex>,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);
    Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health_check))
        // WhatsApp webhook — GET for Meta verification, POST for delivery.
        .route(
            "/webhook",
            get(routes::webhook_verify).post(routes::webhook_receive),
        )
        .route("/api/v1/users", post(routes::create_user))
        .route("/api/v1/documents", post(routes::upload_documents))
        .route("/api/v1/documents/{id}/ask", post(routes::ask_question))
        .route(
            "/api/v1/documents/{id}/vectors",
            delete(routes::delete_document_vectors),
        )
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                ])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Construct every collaborator from config and start the HTTP server.
pub async fn start(config: DocSageConfig) -> anyhow::Result<()> {
    let store = Arc::new(Store::open(&config.store.resolved_db_path())?);

    let oracle = Arc::new(OracleClient::new(config.oracle.clone())?);
    let embedder: Arc<dyn EmbeddingOracle> = oracle.clone();
    let completer: Arc<dyn CompletionOracle> = oracle;
    let index: Arc<dyn PassageIndex> = Arc::new(IndexClient::new(config.index.clone())?);

    let whatsapp = config
        .channel
        .whatsapp
        .clone()
        .ok_or_else(|| DocSageError::Config("channel.whatsapp not configured".into()))?;
    let messenger: Arc<dyn OutboundMessenger> = Arc::new(WhatsAppChannel::new(whatsapp)?);

    let engine = Arc::new(Engine::new(
        store.clone(),
        embedder.clone(),
        completer,
        index.clone(),
        messenger,
        &config,
    ));
    let ingestor = Arc::new(Ingestor::new(
        store.clone(),
        embedder,
        index.clone(),
        config.ingest.clone(),
    ));

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = AppState {
        config,
        store,
        engine,
        ingestor,
        index,
        start_time: std::time::Instant::now(),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("gateway listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
