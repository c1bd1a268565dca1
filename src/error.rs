//! Error types for the AI path and the export pipeline.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::retry::Retryable;

/// The five failure classes of an AI call.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
  Timeout,
  Network,
  InvalidRequest,
  RateLimit,
  ServerError,
}

impl AiErrorKind {
  /// The single retryability rule: only request/auth problems are final.
  pub fn is_retryable(&self) -> bool {
    !matches!(self, AiErrorKind::InvalidRequest)
  }
}

#[derive(Clone, Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct AiError {
  pub kind: AiErrorKind,
  pub message: String,
  pub status: Option<u16>,
  /// Upstream hint (Retry-After) for rate limits.
  pub retry_after: Option<Duration>,
}

impl AiError {
  pub fn new(kind: AiErrorKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into(), status: None, retry_after: None }
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = Some(status);
    self
  }

  pub fn timeout(message: impl Into<String>) -> Self { Self::new(AiErrorKind::Timeout, message) }
  pub fn network(message: impl Into<String>) -> Self { Self::new(AiErrorKind::Network, message) }
  pub fn invalid_request(message: impl Into<String>) -> Self { Self::new(AiErrorKind::InvalidRequest, message) }
  pub fn rate_limit(message: impl Into<String>) -> Self { Self::new(AiErrorKind::RateLimit, message) }
  pub fn server(message: impl Into<String>) -> Self { Self::new(AiErrorKind::ServerError, message) }

  /// Map an HTTP status from the provider into the taxonomy.
  pub fn from_status(status: u16, message: impl Into<String>) -> Self {
    let kind = match status {
      429 => AiErrorKind::RateLimit,
      400 | 401 | 403 | 404 | 422 => AiErrorKind::InvalidRequest,
      408 => AiErrorKind::Timeout,
      _ => AiErrorKind::ServerError,
    };
    Self::new(kind, message).with_status(status)
  }

  /// Localized text for the UI. Each message keeps an English tag so logs and
  /// tests can recognise the class without reading Thai.
  pub fn user_message(&self) -> String {
    match self.kind {
      AiErrorKind::Timeout => "การเชื่อมต่อใช้เวลานานเกินไป กรุณาลองใหม่อีกครั้ง (timeout)".into(),
      AiErrorKind::Network => "ไม่สามารถเชื่อมต่อบริการ AI ได้ กรุณาตรวจสอบการเชื่อมต่อ (network error)".into(),
      AiErrorKind::InvalidRequest => format!("คำขอไม่ถูกต้องหรือการยืนยันตัวตนล้มเหลว (invalid request): {}", self.message),
      AiErrorKind::RateLimit => "มีการใช้งานเกินขีดจำกัด กรุณารอสักครู่แล้วลองใหม่ (rate limit exceeded)".into(),
      AiErrorKind::ServerError => "บริการ AI ขัดข้องหรือตอบกลับไม่ถูกต้อง กรุณาลองใหม่หรือใช้เนื้อหาสำรอง (server error)".into(),
    }
  }
}

impl Retryable for AiError {
  fn is_retryable(&self) -> bool {
    self.kind.is_retryable()
  }

  fn timed_out(after: Duration) -> Self {
    AiError::timeout(format!("no response within {:?}", after))
  }

  fn retry_after(&self) -> Option<Duration> {
    self.retry_after.filter(|_| self.kind == AiErrorKind::RateLimit)
  }
}

impl From<reqwest::Error> for AiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      AiError::timeout(e.to_string())
    } else if let Some(status) = e.status() {
      AiError::from_status(status.as_u16(), e.to_string())
    } else if e.is_decode() || e.is_body() {
      AiError::server(format!("unreadable response body: {e}"))
    } else if e.is_builder() {
      AiError::invalid_request(e.to_string())
    } else {
      AiError::network(e.to_string())
    }
  }
}

#[derive(Debug, Error)]
pub enum ExportError {
  #[error("this device/browser cannot export PDF: {0}")]
  UnsupportedDevice(String),

  #[error("page capture failed: {0}")]
  Capture(String),

  #[error("PDF generation failed: {0}")]
  Pdf(String),

  #[error("template rendering failed: {0}")]
  TemplateRender(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl From<tera::Error> for ExportError {
  fn from(e: tera::Error) -> Self {
    ExportError::TemplateRender(e.to_string())
  }
}

impl From<image::ImageError> for ExportError {
  fn from(e: image::ImageError) -> Self {
    ExportError::Capture(e.to_string())
  }
}
