//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::{header, HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::GenerationRequest;
use crate::error::AiErrorKind;
use crate::export::{DeviceCapabilities, MIME_HTML};
use crate::logic;
use crate::progress::NoProgress;
use crate::protocol::*;
use crate::session::GenerationSession;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let status = logic::service_status(&state).await;
  let cache_entries = state.cache.lock().await.len();
  Json(StatusOut { status, cache_entries })
}

fn status_for(kind: Option<AiErrorKind>) -> StatusCode {
  match kind {
    None => StatusCode::OK,
    Some(AiErrorKind::InvalidRequest) => StatusCode::BAD_REQUEST,
    Some(AiErrorKind::RateLimit) => StatusCode::TOO_MANY_REQUESTS,
    Some(AiErrorKind::Timeout) => StatusCode::GATEWAY_TIMEOUT,
    Some(AiErrorKind::Network | AiErrorKind::ServerError) => StatusCode::BAD_GATEWAY,
  }
}

#[instrument(level = "info", skip(state, body), fields(grade = body.grade_level.label(), topic_len = body.topic.chars().count()))]
pub async fn http_generate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerationRequest>,
) -> impl IntoResponse {
  let mut session = GenerationSession::new();
  let ok = session.generate_content(&state, &body, &NoProgress).await;
  info!(target: "studysheet_backend", %ok, from_cache = session.from_cache, fallback = session.is_fallback_mode, "HTTP generate finished");
  (status_for(session.last_error_kind), Json(session))
}

#[instrument(level = "info", skip(body), fields(grade = body.grade_level.label()))]
pub async fn http_generate_fallback(Json(body): Json<GenerationRequest>) -> impl IntoResponse {
  let mut session = GenerationSession::new();
  session.generate_fallback(&body);
  Json(session)
}

#[instrument(level = "info", skip(body), fields(topic_len = body.topic.chars().count()))]
pub async fn http_generate_emergency(Json(body): Json<EmergencyIn>) -> impl IntoResponse {
  let mut session = GenerationSession::new();
  session.generate_emergency_content(&body.topic);
  Json(session)
}

#[instrument(level = "info", skip(state))]
pub async fn http_clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let removed = logic::clear_cache(&state).await;
  Json(CacheClearedOut { removed })
}

#[instrument(level = "info", skip(state, headers, body), fields(snapshot_len = body.snapshot.len(), scale = body.scale))]
pub async fn http_export_pdf(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<PdfExportIn>,
) -> impl IntoResponse {
  let device = headers
    .get(header::USER_AGENT)
    .and_then(|v| v.to_str().ok())
    .map(DeviceCapabilities::from_user_agent)
    .unwrap_or_default();
  let mut content = body.content;
  content.recompute_metadata();
  let result = logic::export_pdf(&state, &content, &body.snapshot, body.scale, device, Arc::new(NoProgress)).await;
  Json(result)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_export_web(State(state): State<Arc<AppState>>, Json(body): Json<ExportIn>) -> impl IntoResponse {
  let mut content = body.content;
  content.recompute_metadata();
  Json(logic::export_web(&state, &content).await)
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_export_json(State(state): State<Arc<AppState>>, Json(body): Json<ExportIn>) -> impl IntoResponse {
  let mut content = body.content;
  content.recompute_metadata();
  Json(logic::export_json(&state, &content).await)
}

/// `attachment` disposition with an ASCII fallback name and an RFC 5987 UTF-8 name.
fn content_disposition(file_name: &str) -> String {
  let ascii: String = file_name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  let encoded: String = file_name
    .bytes()
    .map(|b| {
      if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_') {
        (b as char).to_string()
      } else {
        format!("%{b:02X}")
      }
    })
    .collect();
  format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_export(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match state.get_export(&id).await {
    Some(file) => (
      [
        (header::CONTENT_TYPE, file.mime.to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(&file.file_name)),
      ],
      file.bytes.as_ref().clone(),
    )
      .into_response(),
    None => {
      warn!(target: "studysheet_backend", %id, "Unknown export id");
      (StatusCode::NOT_FOUND, "export not found").into_response()
    }
  }
}

/// Shared web bundles render inline; other formats are download-only.
#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_share(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
  match state.get_export(&id).await {
    Some(file) if file.mime == MIME_HTML => {
      ([(header::CONTENT_TYPE, MIME_HTML)], file.bytes.as_ref().clone()).into_response()
    }
    _ => (StatusCode::NOT_FOUND, "shared page not found").into_response(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn disposition_keeps_thai_names_downloadable() {
    let d = content_disposition("เศษส่วน-2026-01-02.pdf");
    assert!(d.starts_with("attachment; filename=\""));
    assert!(d.contains("-2026-01-02.pdf\""));
    assert!(d.contains("filename*=UTF-8''%E0%B9%80"));
    assert!(d.is_ascii());
  }

  #[test]
  fn error_kinds_map_to_http_statuses() {
    assert_eq!(status_for(None), StatusCode::OK);
    assert_eq!(status_for(Some(AiErrorKind::RateLimit)), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(status_for(Some(AiErrorKind::InvalidRequest)), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(Some(AiErrorKind::ServerError)), StatusCode::BAD_GATEWAY);
  }
}
