//! Per-client generation state: the latest sheet, progress, and the last error.
//!
//! One session per WebSocket connection (or per HTTP call). Concurrent
//! generations are not serialized; whichever finishes last wins.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{GenerationRequest, ServiceStatus, StudySheetContent};
use crate::error::AiErrorKind;
use crate::fallback::{self, FallbackOptions};
use crate::logic;
use crate::progress::{GenerationStage, ProgressObserver};
use crate::state::AppState;
use crate::util::millis_u64;

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
  pub content: Option<StudySheetContent>,
  pub error: Option<String>,
  pub last_error_kind: Option<AiErrorKind>,
  pub progress: u8,
  pub is_generating: bool,
  pub is_fallback_mode: bool,
  pub from_cache: bool,
  pub service_status: ServiceStatus,
}

/// Tracks the highest percent seen while forwarding to the caller's observer.
struct Tracking<'a> {
  inner: &'a dyn ProgressObserver<GenerationStage>,
  percent: AtomicU8,
}

impl ProgressObserver<GenerationStage> for Tracking<'_> {
  fn on_stage(&self, stage: GenerationStage, percent: u8) {
    self.percent.fetch_max(percent, Ordering::Relaxed);
    self.inner.on_stage(stage, percent);
  }
}

impl GenerationSession {
  pub fn new() -> Self {
    Self::default()
  }

  /// Generate through the AI path. Without an API key this degrades to the
  /// template fallback. Returns whether `content` now holds a fresh sheet.
  pub async fn generate_content(
    &mut self,
    state: &AppState,
    req: &GenerationRequest,
    progress: &dyn ProgressObserver<GenerationStage>,
  ) -> bool {
    self.is_generating = true;
    self.error = None;
    self.last_error_kind = None;
    self.progress = 0;

    if !state.ai_configured() {
      info!(target: "studysheet_backend", "AI path not configured; using fallback templates");
      self.generate_fallback(req);
      self.service_status = logic::service_status(state).await;
      return true;
    }

    let tracking = Tracking { inner: progress, percent: AtomicU8::new(0) };
    let outcome = logic::generate_study_sheet(state, req, &tracking).await;
    self.service_status = logic::service_status(state).await;

    let ok = match outcome {
      Ok(generated) => {
        self.content = Some(generated.content);
        self.from_cache = generated.from_cache;
        self.is_fallback_mode = false;
        self.progress = tracking.percent.load(Ordering::Relaxed);
        true
      }
      Err(e) => {
        warn!(target: "studysheet_backend", kind = ?e.kind, error = %e.message, "Generation failed");
        if e.kind == AiErrorKind::RateLimit {
          self.service_status.rate_limit_available = false;
          if let Some(after) = e.retry_after {
            self.service_status.wait_time_ms = self.service_status.wait_time_ms.max(millis_u64(after));
          }
        }
        self.error = Some(e.user_message());
        self.last_error_kind = Some(e.kind);
        self.progress = 0;
        false
      }
    };
    self.is_generating = false;
    ok
  }

  pub fn generate_fallback(&mut self, req: &GenerationRequest) {
    self.content = Some(fallback::generate_fallback_content(req, &FallbackOptions::default()));
    self.finish_local();
  }

  /// Minimal sheet, no I/O. Always succeeds.
  pub fn generate_emergency_content(&mut self, topic: &str) -> bool {
    self.content = Some(fallback::generate_emergency_content(topic));
    self.finish_local();
    true
  }

  fn finish_local(&mut self) {
    self.error = None;
    self.last_error_kind = None;
    self.is_fallback_mode = true;
    self.from_cache = false;
    self.is_generating = false;
    self.progress = 100;
  }

  pub fn reset(&mut self) {
    *self = Self::default();
  }
}
