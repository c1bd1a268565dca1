//! Loading service configuration (prompts, limits, branding) from TOML.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! See `AppConfig` for the expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub limits: Limits,
  #[serde(default)]
  pub branding: Branding,
}

/// Prompts used by the AI client. Placeholders are filled by `prompt::build_prompt`:
/// `{topic}`, `{grade}`, `{age_range}`, `{grade_guidance}`, `{content_guidance}`,
/// `{exercise_guidance}`, `{page_count}`, `{section_count}`, `{exercise_count}`,
/// `{activity_count}`, `{easy}`, `{medium}`, `{hard}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "คุณคือครูผู้เชี่ยวชาญด้านการออกแบบสื่อการเรียนรู้สำหรับนักเรียนมัธยมศึกษาไทย \
               สร้างเอกสารประกอบการเรียนที่ถูกต้องตามหลักวิชาการ เหมาะกับวัยของผู้เรียน \
               ตอบกลับเป็น JSON ที่ถูกต้องเท่านั้น ห้ามมีข้อความอื่นนอก JSON"
        .into(),
      user_template: "สร้างเอกสารประกอบการเรียนเรื่อง \"{topic}\" สำหรับนักเรียนระดับ{grade} (อายุ {age_range})\n\
                      ระดับภาษา: {grade_guidance}\n\
                      ปริมาณเนื้อหา: {content_guidance} (ประมาณ {page_count} หน้า, {section_count} หัวข้อ)\n\
                      แบบฝึกหัด: {exercise_guidance} (จำนวน {exercise_count} ข้อ, กิจกรรม {activity_count} กิจกรรม)\n\
                      สัดส่วนความยาก: ง่าย {easy}% ปานกลาง {medium}% ยาก {hard}%\n\n\
                      ตอบเป็น JSON object ที่มีฟิลด์ดังนี้:\n\
                      title (string), objectives (array of string),\n\
                      mainContent (array of object: id, title, type = theory|explanation|example|practice|summary, content, duration (minutes), keyTerms (array of string), noteSpace (boolean)),\n\
                      exercises (array of object: id, type = multiple-choice|short-answer|essay|true-false, question, options (array of string, multiple-choice only), difficulty = easy|medium|hard, points, answerSpace (lines)),\n\
                      activities (array of object: id, title, type = group|individual|demonstration|discussion, description, duration, materials (array), instructions (array)),\n\
                      images (array of object: id, description, placement, caption),\n\
                      summary (string)"
        .into(),
    }
  }
}

/// Throttling, caching and retry knobs. None of these values is load-bearing;
/// they are kept configurable rather than fixed.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Limits {
  pub requests_per_window: usize,
  pub window_secs: u64,
  pub cache_ttl_secs: u64,
  pub cache_max_entries: usize,
  pub cache_sweep_secs: u64,
  pub retry_attempts: u32,
  pub retry_base_delay_ms: u64,
  pub request_timeout_secs: u64,
  pub max_tokens: u32,
  pub temperature: f32,
  /// Request body ceiling for PDF export, which carries a base64 page snapshot.
  pub max_snapshot_bytes: usize,
  pub export_ttl_secs: u64,
  pub max_exports: usize,
}

impl Default for Limits {
  fn default() -> Self {
    Self {
      requests_per_window: 20,
      window_secs: 60,
      cache_ttl_secs: 30 * 60,
      cache_max_entries: 100,
      cache_sweep_secs: 5 * 60,
      retry_attempts: 3,
      retry_base_delay_ms: 1000,
      request_timeout_secs: 60,
      max_tokens: 4000,
      temperature: 0.7,
      max_snapshot_bytes: 25 * 1024 * 1024,
      export_ttl_secs: 24 * 60 * 60,
      max_exports: 200,
    }
  }
}

impl Limits {
  pub fn window(&self) -> Duration { Duration::from_secs(self.window_secs) }
  pub fn cache_ttl(&self) -> Duration { Duration::from_secs(self.cache_ttl_secs) }
  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }
  pub fn retry_base_delay(&self) -> Duration { Duration::from_millis(self.retry_base_delay_ms) }
  pub fn export_ttl(&self) -> Duration { Duration::from_secs(self.export_ttl_secs) }
}

/// Branding applied to PDF pages and to the web bundle.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Branding {
  pub app_title: String,
  pub logo_text: String,
  /// RGB, 0-255.
  pub header_color: [u8; 3],
  pub footer_text: String,
  pub watermark: Option<String>,
  pub share_domain: String,
  pub site_url: String,
}

impl Default for Branding {
  fn default() -> Self {
    Self {
      app_title: "StudySheet Generator".into(),
      logo_text: "StudySheet".into(),
      header_color: [37, 99, 235],
      footer_text: "Generated by StudySheet".into(),
      watermark: None,
      share_domain: "share.studysheet.app".into(),
      site_url: "https://studysheet.app".into(),
    }
  }
}

/// Attempt to load `AppConfig` from STUDYSHEET_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("STUDYSHEET_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AppConfig>(&s) {
      Ok(cfg) => {
        info!(target: "studysheet_backend", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "studysheet_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "studysheet_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
