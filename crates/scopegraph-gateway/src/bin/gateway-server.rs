//! Gateway API Server
//!
//! Exposes the render operation over HTTP for visualization clients.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use scopegraph_gateway::{
    init_tracing, ErrorCategory, Gateway, GatewayConfig, GatewayError, GraphStore, Identity,
    Neo4jGraphStore, TenantId,
};

// Shared application state
#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = GatewayConfig::load().context("Failed to load gateway configuration")?;

    info!("Connecting to Neo4j at: {}", config.neo4j.uri);
    let store = Neo4jGraphStore::connect(config.neo4j.clone())
        .await
        .context("Failed to connect to Neo4j")?;
    let store: Arc<dyn GraphStore> = Arc::new(store);

    let gateway = Gateway::from_config(&config, store).context("Invalid gateway configuration")?;
    let app_state = AppState {
        gateway: Arc::new(gateway),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/render", post(render))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let ip = config
        .bind_address
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid SERVER_HOST: {}", config.bind_address))?;
    let addr = SocketAddr::new(ip, config.port);
    info!("Starting server on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .context("Server error")?;
    Ok(())
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    tenant_id: String,
    #[serde(default)]
    identity: String,
}

async fn render(State(state): State<AppState>, Json(request): Json<RenderRequest>) -> Response {
    let result = state
        .gateway
        .render(
            &request.query,
            &TenantId::new(request.tenant_id),
            &Identity::new(request.identity),
        )
        .await;

    match result {
        Ok(graph) => (StatusCode::OK, Json(graph)).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(e: GatewayError) -> Response {
    let status = match e.category() {
        ErrorCategory::InputError => StatusCode::BAD_REQUEST,
        ErrorCategory::StoreError => StatusCode::BAD_GATEWAY,
        ErrorCategory::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status != StatusCode::BAD_REQUEST {
        error!("Render failed: {}", e);
    }
    (status, Json(e.to_body())).into_response()
}
