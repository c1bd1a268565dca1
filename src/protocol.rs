//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{GenerationRequest, ServiceStatus, StudySheetContent};
use crate::export::ExportResult;
use crate::progress::{ExportStage, GenerationStage};
use crate::session::GenerationSession;

fn default_scale() -> f32 {
    1.0
}

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// Request fields sit next to `type`.
    Generate(GenerationRequest),
    Fallback(GenerationRequest),
    Emergency {
        #[serde(default)]
        topic: String,
    },
    ExportPdf {
        content: StudySheetContent,
        /// Base64 PNG/JPEG (a data URL is accepted too).
        snapshot: String,
        #[serde(default = "default_scale")]
        scale: f32,
    },
    ExportWeb {
        content: StudySheetContent,
    },
    ExportJson {
        content: StudySheetContent,
    },
    Reset,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Progress {
        stage: GenerationStage,
        percent: u8,
    },
    ExportProgress {
        stage: ExportStage,
        percent: u8,
    },
    Generation {
        ok: bool,
        session: GenerationSession,
    },
    Export {
        format: ExportFormat,
        result: ExportResult,
    },
    Error {
        message: String,
    },
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Web,
    Json,
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOut {
    #[serde(flatten)]
    pub status: ServiceStatus,
    pub cache_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyIn {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct CacheClearedOut {
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct ExportIn {
    pub content: StudySheetContent,
}

#[derive(Debug, Deserialize)]
pub struct PdfExportIn {
    pub content: StudySheetContent,
    pub snapshot: String,
    #[serde(default = "default_scale")]
    pub scale: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GradeLevel;

    #[test]
    fn generate_message_carries_request_inline() {
        let raw = r#"{"type":"generate","topic":"พีชคณิต","gradeLevel":"ม.1","contentAmount":"ปานกลาง","exerciseAmount":"ปานกลาง"}"#;
        match serde_json::from_str::<ClientWsMessage>(raw).unwrap() {
            ClientWsMessage::Generate(req) => {
                assert_eq!(req.topic, "พีชคณิต");
                assert_eq!(req.grade_level, GradeLevel::M1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn progress_events_are_tagged() {
        let msg = ServerWsMessage::ExportProgress { stage: ExportStage::Converting, percent: 60 };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            serde_json::json!({ "type": "export_progress", "stage": "converting", "percent": 60 })
        );
    }
}
