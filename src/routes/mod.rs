//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws`
/// - REST-ish API under `/api/v1/...`
/// - Shared web bundles at `/share/:id`
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
///
/// The PDF route carries a page snapshot and gets its own body ceiling
/// (`limits.max_snapshot_bytes`) instead of the 2 MB default.
pub fn build_router(state: Arc<AppState>) -> Router {
    let snapshot_limit = state.config.limits.max_snapshot_bytes;

    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/status", get(http::http_status))
        .route("/api/v1/generate", post(http::http_generate))
        .route("/api/v1/generate/fallback", post(http::http_generate_fallback))
        .route("/api/v1/generate/emergency", post(http::http_generate_emergency))
        .route("/api/v1/cache", delete(http::http_clear_cache))
        .route(
            "/api/v1/export/pdf",
            post(http::http_export_pdf).layer(DefaultBodyLimit::max(snapshot_limit)),
        )
        .route("/api/v1/export/web", post(http::http_export_web))
        .route("/api/v1/export/json", post(http::http_export_json))
        .route("/api/v1/exports/:id", get(http::http_get_export))
        .route("/share/:id", get(http::http_share))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
