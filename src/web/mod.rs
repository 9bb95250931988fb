//! Web server module

mod middleware;
mod routes;
mod sites;

use anyhow::Result;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::geoip::SharedGeoIp;

pub struct AppState {
    pub db: Database,
    pub geoip: SharedGeoIp,
    pub admin_token: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not found" })),
    )
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // The beacon endpoint is called cross-origin from tracked sites, so
    // CORS stays permissive, matching the tracking-script contract.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Public beacon endpoint used by the tracking script
        .route("/send", post(routes::track_beacon))
        // Event ingestion and reports
        .route("/api/events", post(routes::create_event))
        .route("/api/events/:site_id", get(routes::list_events))
        .route("/api/events/:site_id/summary", get(routes::summary))
        .route("/api/events/:site_id/rank", get(routes::rank))
        // Site management
        .route("/api/sites", get(sites::list_sites).post(sites::create_site))
        .route(
            "/api/sites/:id",
            get(sites::get_site).delete(sites::delete_site),
        )
        .route("/api/sites/:id/stats", delete(sites::clear_site_stats))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                // Handler panics become 500s instead of dropped connections
                .layer(CatchPanicLayer::new())
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

pub async fn start_server(config: &Config, db: Database, geoip: SharedGeoIp) -> Result<()> {
    let state = Arc::new(AppState {
        db,
        geoip,
        admin_token: config.auth.admin_token.clone(),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Web server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
