//! StudySheet · Study Sheet Generator Backend
//!
//! - Axum HTTP + WebSocket API
//! - Optional OpenRouter (OpenAI-compatible) generation with retry, cache and rate limiting
//! - Template fallback when no API key is configured or the AI path fails
//! - PDF / web / JSON export
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                   : u16 (default 3000)
//!   OPENROUTER_API_KEY     : enables AI generation if present
//!   OPENROUTER_BASE_URL    : default "https://openrouter.ai/api/v1"
//!   OPENROUTER_MODEL       : default "openai/gpt-4o-mini"
//!   STUDYSHEET_CONFIG_PATH : path to TOML config (prompts, limits, branding)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod catalog;
mod config;
mod prompt;
mod error;
mod schema;
mod ratelimit;
mod retry;
mod cache;
mod fallback;
mod progress;
mod openai;
mod state;
mod logic;
mod session;
mod export;
mod protocol;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Config, AI client, limiter, cache, export store.
  let state = Arc::new(AppState::new());
  let _sweeper = state.clone().spawn_cache_sweeper();

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "studysheet_backend", %addr, ai = state.ai_configured(), "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "studysheet_backend", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
