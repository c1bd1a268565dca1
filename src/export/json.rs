//! JSON export: the content wrapped in a versioned envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StudySheetContent;
use crate::error::ExportError;

use super::{export_file_name, ExportArtifact, MIME_JSON};

pub const ENVELOPE_VERSION: &str = "1.0";
pub const GENERATOR: &str = "StudySheet Generator";
pub const PLATFORM: &str = concat!("studysheet-backend/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMeta {
  pub generator: String,
  pub platform: String,
  pub exported_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExportEnvelope {
  pub version: String,
  pub content: StudySheetContent,
  pub metadata: EnvelopeMeta,
}

pub fn build_json(content: &StudySheetContent, now: DateTime<Utc>) -> Result<ExportArtifact, ExportError> {
  let envelope = ExportEnvelope {
    version: ENVELOPE_VERSION.to_string(),
    content: content.clone(),
    metadata: EnvelopeMeta {
      generator: GENERATOR.to_string(),
      platform: PLATFORM.to_string(),
      exported_at: now,
    },
  };
  let bytes = serde_json::to_vec_pretty(&envelope)?;
  Ok(ExportArtifact {
    file_name: export_file_name(&content.title, "json", now.date_naive()),
    mime: MIME_JSON,
    bytes,
  })
}
