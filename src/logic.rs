//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Generating a study sheet (validate, cache, rate-limited AI call with retry)
//!   - Deriving the service status on demand
//!   - Running the three export targets and storing their output
//!
//! Export functions never fail outward: every error becomes `ExportResult::failed`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use crate::cache::CacheKey;
use crate::domain::{GenerationRequest, ServiceStatus, StudySheetContent};
use crate::error::{AiError, ExportError};
use crate::export::pdf::{build_pdf, SnapshotCapture};
use crate::export::{export_file_name, json::build_json, web::build_web_bundle};
use crate::export::{DeviceCapabilities, ExportArtifact, ExportResult, MIME_PDF};
use crate::progress::{ExportStage, GenerationStage, ProgressObserver};
use crate::retry::retry_with_backoff;
use crate::state::AppState;
use crate::util::millis_u64;

#[derive(Clone, Debug)]
pub struct Generated {
  pub content: StudySheetContent,
  pub from_cache: bool,
}

/// Generate a sheet through the AI path. Callers decide what to do when the
/// AI path is not configured (see `session`); here it is an invalid request.
#[instrument(level = "info", skip(state, req, progress), fields(grade = req.grade_level.label(), topic_len = req.topic.chars().count()))]
pub async fn generate_study_sheet(
  state: &AppState,
  req: &GenerationRequest,
  progress: &dyn ProgressObserver<GenerationStage>,
) -> Result<Generated, AiError> {
  let stage = |s: GenerationStage| progress.on_stage(s, s.percent());

  stage(GenerationStage::Validating);
  req.validate().map_err(AiError::invalid_request)?;
  let oa = state
    .openai
    .as_ref()
    .ok_or_else(|| AiError::invalid_request("AI generation is not configured"))?;

  stage(GenerationStage::CheckingCache);
  let model = oa.model_for(req, None).to_string();
  let key = CacheKey::for_request(req, &model);
  if let Some(content) = state.cache.lock().await.get(&key) {
    debug!(target: "studysheet_backend", key = key.as_str(), "Cache hit");
    stage(GenerationStage::Complete);
    return Ok(Generated { content, from_cache: true });
  }

  stage(GenerationStage::Generating);
  // The limiter wait runs before each attempt, outside the attempt timeout.
  let content = retry_with_backoff(
    &state.retry,
    || oa.acquire_slot(),
    || oa.generate_study_sheet(req, Some(model.as_str())),
  )
  .await?;

  stage(GenerationStage::Finalizing);
  state.cache.lock().await.set(key, content.clone());

  stage(GenerationStage::Complete);
  Ok(Generated { content, from_cache: false })
}

pub async fn service_status(state: &AppState) -> ServiceStatus {
  let mut rl = state.limiter.lock().await;
  ServiceStatus {
    configured: state.ai_configured(),
    rate_limit_available: rl.can_make_request(),
    wait_time_ms: millis_u64(rl.wait_time()),
  }
}

/// Drop every cached sheet; returns how many were removed.
pub async fn clear_cache(state: &AppState) -> usize {
  let mut cache = state.cache.lock().await;
  let n = cache.len();
  cache.clear();
  info!(target: "studysheet_backend", removed = n, "Cache cleared");
  n
}

async fn store(state: &AppState, artifact: ExportArtifact) -> (String, ExportResult) {
  let size = artifact.bytes.len();
  let file_name = artifact.file_name.clone();
  let id = state.store_export(artifact.file_name, artifact.mime, artifact.bytes).await;
  let result = ExportResult {
    success: true,
    download_url: Some(format!("/api/v1/exports/{id}")),
    file_name: Some(file_name),
    size: Some(size),
    ..Default::default()
  };
  (id, result)
}

fn failed(target: &str, e: ExportError) -> ExportResult {
  error!(target: "studysheet_backend::export", export = target, error = %e, "Export failed");
  ExportResult::failed(e.to_string())
}

#[instrument(level = "info", skip_all, fields(title = %content.title))]
pub async fn export_json(state: &AppState, content: &StudySheetContent) -> ExportResult {
  match build_json(content, Utc::now()) {
    Ok(artifact) => store(state, artifact).await.1,
    Err(e) => failed("json", e),
  }
}

#[instrument(level = "info", skip_all, fields(title = %content.title))]
pub async fn export_web(state: &AppState, content: &StudySheetContent) -> ExportResult {
  match build_web_bundle(content, &state.config.branding, Utc::now()) {
    Ok(artifact) => {
      let (id, mut result) = store(state, artifact).await;
      result.share_url = Some(format!("https://{}/share/{}", state.config.branding.share_domain, id));
      result
    }
    Err(e) => failed("web", e),
  }
}

/// Assemble a PDF from the client's base64 page snapshot on the blocking pool.
#[instrument(level = "info", skip_all, fields(title = %content.title, snapshot_len = snapshot_b64.len()))]
pub async fn export_pdf(
  state: &AppState,
  content: &StudySheetContent,
  snapshot_b64: &str,
  snapshot_scale: f32,
  device: DeviceCapabilities,
  progress: Arc<dyn ProgressObserver<ExportStage>>,
) -> ExportResult {
  if !device.supported {
    progress.on_stage(ExportStage::Preparing, ExportStage::Preparing.percent());
    return failed("pdf", ExportError::UnsupportedDevice("please use a recent desktop browser or the web/JSON export".into()));
  }
  let capture = match SnapshotCapture::from_base64(snapshot_b64, snapshot_scale) {
    Ok(c) => c,
    Err(e) => return failed("pdf", e),
  };

  let owned = content.clone();
  let branding = state.config.branding.clone();
  let built = tokio::task::spawn_blocking(move || build_pdf(&owned, &capture, &branding, &device, progress.as_ref())).await;

  match built {
    Ok(Ok(out)) => {
      debug!(target: "studysheet_backend::export", pages = out.pages, bytes = out.bytes.len(), "PDF assembled");
      let artifact = ExportArtifact {
        file_name: export_file_name(&content.title, "pdf", Utc::now().date_naive()),
        mime: MIME_PDF,
        bytes: out.bytes,
      };
      store(state, artifact).await.1
    }
    Ok(Err(e)) => failed("pdf", e),
    Err(join) => failed("pdf", ExportError::Pdf(format!("PDF worker stopped: {join}"))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Amount, GradeLevel};
  use crate::error::AiErrorKind;
  use crate::fallback::generate_emergency_content;
  use crate::openai::tests::{completion, sheet_json};
  use crate::progress::tests::Recorder;
  use crate::progress::NoProgress;
  use crate::config::AppConfig;
  use crate::openai::tests::test_settings;
  use crate::state::tests::state_for;
  use base64::Engine as _;
  use std::time::Duration;
  use wiremock::matchers::method;
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn request() -> GenerationRequest {
    GenerationRequest::new("พีชคณิต", GradeLevel::M1, Amount::Medium, Amount::Medium)
  }

  #[tokio::test]
  async fn second_identical_request_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(&sheet_json("พีชคณิต ม.1"))))
      .expect(1)
      .mount(&server)
      .await;
    let state = state_for(Some(&server.uri()));

    let rec = Recorder::<GenerationStage>::new();
    let first = generate_study_sheet(&state, &request(), &rec).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(
      rec.stages(),
      vec![
        GenerationStage::Validating,
        GenerationStage::CheckingCache,
        GenerationStage::Generating,
        GenerationStage::Finalizing,
        GenerationStage::Complete,
      ]
    );

    let second = generate_study_sheet(&state, &request(), &NoProgress).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.content, first.content);

    assert_eq!(clear_cache(&state).await, 1);
  }

  #[tokio::test]
  async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(503))
      .up_to_n_times(2)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(&sheet_json("ok"))))
      .mount(&server)
      .await;
    let state = state_for(Some(&server.uri()));
    let out = generate_study_sheet(&state, &request(), &NoProgress).await.unwrap();
    assert_eq!(out.content.title, "ok");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn full_limiter_delays_instead_of_timing_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(&sheet_json("ok"))))
      .expect(1)
      .mount(&server)
      .await;
    let mut config = AppConfig::default();
    config.limits.requests_per_window = 1;
    config.limits.window_secs = 1;
    config.limits.retry_attempts = 1;
    let mut state = AppState::with_settings(config, Some(test_settings(&server.uri())));
    state.retry.attempt_timeout = Some(Duration::from_millis(300));
    state.limiter.lock().await.record_request();

    let out = generate_study_sheet(&state, &request(), &NoProgress).await.unwrap();
    assert_eq!(out.content.title, "ok");
  }

  #[tokio::test]
  async fn auth_failures_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(401))
      .expect(1)
      .mount(&server)
      .await;
    let state = state_for(Some(&server.uri()));
    let err = generate_study_sheet(&state, &request(), &NoProgress).await.unwrap_err();
    assert_eq!(err.kind, AiErrorKind::InvalidRequest);
  }

  #[tokio::test]
  async fn invalid_requests_never_reach_the_provider() {
    let state = state_for(None);
    let mut req = request();
    req.topic = "   ".into();
    let err = generate_study_sheet(&state, &req, &NoProgress).await.unwrap_err();
    assert_eq!(err.kind, AiErrorKind::InvalidRequest);

    let status = service_status(&state).await;
    assert!(!status.configured);
    assert!(status.rate_limit_available);
    assert_eq!(status.wait_time_ms, 0);
  }

  #[tokio::test]
  async fn json_and_web_exports_are_stored() {
    let state = state_for(None);
    let content = generate_emergency_content("คณิตศาสตร์");

    let json = export_json(&state, &content).await;
    assert!(json.success);
    let id = json.download_url.as_deref().unwrap().trim_start_matches("/api/v1/exports/").to_string();
    let stored = state.get_export(&id).await.unwrap();
    assert_eq!(stored.mime, "application/json");
    assert_eq!(Some(stored.bytes.len()), json.size);

    let web = export_web(&state, &content).await;
    assert!(web.success);
    assert!(web.share_url.unwrap().starts_with("https://share.studysheet.app/share/"));
    assert!(web.file_name.unwrap().ends_with(".html"));
  }

  #[tokio::test]
  async fn pdf_export_reports_failures_as_results() {
    let state = state_for(None);
    let content = generate_emergency_content("x");

    let old_phone = DeviceCapabilities { constrained: true, supported: false };
    let res = export_pdf(&state, &content, "", 1.0, old_phone, Arc::new(NoProgress)).await;
    assert!(!res.success);
    assert!(res.error.is_some());

    let res = export_pdf(&state, &content, "%%%", 1.0, DeviceCapabilities::desktop(), Arc::new(NoProgress)).await;
    assert!(!res.success);
  }

  #[tokio::test]
  async fn pdf_export_succeeds_with_a_snapshot() {
    let state = state_for(None);
    let img = image::RgbImage::from_pixel(100, 300, image::Rgb([255, 255, 255]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
      .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
      .unwrap();
    let b64 = base64::engine::general_purpose::STANDARD.encode(png);

    let rec = Arc::new(Recorder::<ExportStage>::new());
    let res = export_pdf(&state, &generate_emergency_content("x"), &b64, 2.0, DeviceCapabilities::desktop(), rec.clone()).await;
    assert!(res.success, "{:?}", res.error);
    assert!(res.file_name.unwrap().ends_with(".pdf"));
    assert_eq!(rec.stages().last(), Some(&ExportStage::Complete));
  }
}
