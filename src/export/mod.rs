//! Export targets for a finished study sheet: PDF, shareable web bundle, JSON.
//!
//! The builders here are pure (content in, bytes out). Storing the bytes and
//! turning failures into `ExportResult { success: false, .. }` happens in `logic`.

use chrono::NaiveDate;
use serde::Serialize;

use crate::util::sanitize_file_stem;

pub mod device;
pub mod json;
pub mod pdf;
pub mod web;

pub use device::DeviceCapabilities;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_JSON: &str = "application/json";
pub const MIME_HTML: &str = "text/html; charset=utf-8";

/// Bytes ready to be stored and downloaded.
#[derive(Debug)]
pub struct ExportArtifact {
  pub file_name: String,
  pub mime: &'static str,
  pub bytes: Vec<u8>,
}

/// Uniform outcome of every export target.
#[derive(Clone, Debug, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
  pub success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub download_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub share_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub size: Option<usize>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl ExportResult {
  pub fn failed(error: impl Into<String>) -> Self {
    Self { success: false, error: Some(error.into()), ..Default::default() }
  }
}

/// `<sanitized-title>-<YYYY-MM-DD>.<ext>`
pub fn export_file_name(title: &str, ext: &str, date: NaiveDate) -> String {
  format!("{}-{}.{}", sanitize_file_stem(title), date.format("%Y-%m-%d"), ext)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_names_carry_date_and_extension() {
    let d = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
    assert_eq!(export_file_name("พีชคณิต ม.1", "pdf", d), "พีชคณิต-ม1-2026-03-07.pdf");
    assert_eq!(export_file_name("a/b\\c", "json", d), "abc-2026-03-07.json");
  }

  #[test]
  fn failed_result_serializes_without_empty_fields() {
    let v = serde_json::to_value(ExportResult::failed("boom")).unwrap();
    assert_eq!(v, serde_json::json!({ "success": false, "error": "boom" }));
  }
}
