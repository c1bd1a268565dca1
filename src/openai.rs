//! Minimal OpenAI-compatible chat-completions client for study sheet generation.
//!
//! One operation matters here: `generate_study_sheet`, preceded by `acquire_slot`
//! (wait for the rate limiter, take one slot). It builds the prompt, issues one POST
//! asking for a JSON object, and turns the answer into typed content or an `AiError`
//! from the five-class taxonomy.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{content_profile, grade_profile};
use crate::config::{AppConfig, Prompts};
use crate::domain::{GenerationRequest, StudySheetContent};
use crate::error::AiError;
use crate::prompt::build_prompt;
use crate::ratelimit::RateLimiter;
use crate::schema::parse_study_sheet;
use crate::util::{millis_u64, trunc_for_log};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Clone, Debug)]
pub struct ClientSettings {
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  /// Sent as `HTTP-Referer`.
  pub site_url: String,
  /// Sent as `X-Title`.
  pub app_title: String,
  pub timeout: Duration,
  pub max_tokens: u32,
  pub temperature: f32,
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub settings: ClientSettings,
  pub prompts: Prompts,
  limiter: Arc<Mutex<RateLimiter>>,
}

impl OpenAI {
  /// Construct the client if we find OPENROUTER_API_KEY; otherwise return None.
  pub fn from_env(cfg: &AppConfig, limiter: Arc<Mutex<RateLimiter>>) -> Option<Self> {
    let api_key = std::env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

    let settings = ClientSettings {
      api_key,
      base_url,
      model,
      site_url: cfg.branding.site_url.clone(),
      app_title: cfg.branding.app_title.clone(),
      timeout: cfg.limits.request_timeout(),
      max_tokens: cfg.limits.max_tokens,
      temperature: cfg.limits.temperature,
    };
    match Self::new(settings, cfg.prompts.clone(), limiter) {
      Ok(c) => Some(c),
      Err(e) => {
        error!(target: "studysheet_backend", error = %e, "Failed to build HTTP client; AI path disabled");
        None
      }
    }
  }

  pub fn new(settings: ClientSettings, prompts: Prompts, limiter: Arc<Mutex<RateLimiter>>) -> Result<Self, AiError> {
    let client = reqwest::Client::builder()
      .timeout(settings.timeout)
      .build()
      .map_err(|e| AiError::invalid_request(format!("HTTP client construction failed: {e}")))?;
    Ok(Self { client, settings, prompts, limiter })
  }

  pub fn model_for<'a>(&'a self, req: &'a GenerationRequest, model_override: Option<&'a str>) -> &'a str {
    model_override
      .or(req.model.as_deref())
      .filter(|m| !m.trim().is_empty())
      .unwrap_or(&self.settings.model)
  }

  /// Wait (rather than fail) until the limiter has room, then take the slot.
  pub async fn acquire_slot(&self) {
    loop {
      let wait = {
        let mut rl = self.limiter.lock().await;
        if rl.can_make_request() {
          rl.record_request();
          None
        } else {
          Some(rl.wait_time())
        }
      };
      match wait {
        None => return,
        Some(d) => {
          warn!(target: "studysheet", wait_ms = millis_u64(d), "Local rate limit reached; delaying AI call");
          tokio::time::sleep(d.max(Duration::from_millis(10))).await;
        }
      }
    }
  }

  /// Generate one study sheet. Callers take a limiter slot through `acquire_slot`
  /// first, one per call whatever the outcome; `logic` does so outside the
  /// per-attempt timeout.
  #[instrument(
    level = "info",
    skip(self, req, model_override),
    fields(grade = req.grade_level.label(), topic_len = req.topic.len(), model = %self.model_for(req, model_override))
  )]
  pub async fn generate_study_sheet(
    &self,
    req: &GenerationRequest,
    model_override: Option<&str>,
  ) -> Result<StudySheetContent, AiError> {
    let model = self.model_for(req, model_override).to_string();
    let prompt = build_prompt(&self.prompts, req);

    let start = Instant::now();
    let text = self.chat_json_text(&model, &prompt.system, &prompt.user).await;
    let elapsed = start.elapsed();
    let text = match text {
      Ok(t) => {
        info!(?elapsed, response_bytes = t.len(), "Model response received successfully");
        t
      }
      Err(e) => {
        error!(?elapsed, kind = ?e.kind, status = ?e.status, error = %e.message, "Model call failed during study sheet generation");
        return Err(e);
      }
    };

    let profile = content_profile(req.content_amount);
    let draft = parse_study_sheet(&text, profile.minutes_per_section).map_err(|e| {
      warn!(error = %e, preview = %trunc_for_log(&text, 120), "Model output failed validation");
      AiError::server(format!("invalid study sheet JSON: {e}"))
    })?;
    let content = draft.finish(profile.page_count, grade_profile(req.grade_level).difficulty_label);

    info!(
      title_preview = %content.title.chars().take(40).collect::<String>(),
      sections = content.metadata.section_count,
      exercises = content.metadata.exercise_count,
      activities = content.metadata.activity_count,
      "Study sheet successfully generated"
    );
    Ok(content)
  }

  /// JSON-object chat completion; returns the raw `choices[0].message.content`.
  #[instrument(level = "debug", skip(self, system, user), fields(model = %model))]
  async fn chat_json_text(&self, model: &str, system: &str, user: &str) -> Result<String, AiError> {
    let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature: self.settings.temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: Some(self.settings.max_tokens),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "studysheet-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key))
      .header("HTTP-Referer", &self.settings.site_url)
      .header("X-Title", &self.settings.app_title)
      .json(&req).send().await.map_err(AiError::from)?;

    if !res.status().is_success() {
      let status = res.status();
      let retry_after = res.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      let mut err = AiError::from_status(status.as_u16(), format!("HTTP {}: {}", status, msg));
      err.retry_after = retry_after;
      return Err(err);
    }

    let body: ChatCompletionResponse = res.json().await
      .map_err(|e| AiError::server(format!("malformed completion envelope: {e}")))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Model usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(AiError::server("empty completion content"));
    }
    debug!(preview = %trunc_for_log(&text, 80), "Completion content");
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from a provider error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::domain::{Amount, GradeLevel};
  use crate::error::AiErrorKind;
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  pub(crate) fn test_settings(base_url: &str) -> ClientSettings {
    ClientSettings {
      api_key: "test-key".into(),
      base_url: base_url.into(),
      model: "test/model".into(),
      site_url: "https://studysheet.test".into(),
      app_title: "StudySheet Test".into(),
      timeout: Duration::from_secs(5),
      max_tokens: 1000,
      temperature: 0.5,
    }
  }

  pub(crate) fn completion(content: &str) -> serde_json::Value {
    json!({
      "choices": [{ "message": { "role": "assistant", "content": content } }],
      "usage": { "prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30 }
    })
  }

  pub(crate) fn sheet_json(title: &str) -> String {
    json!({
      "title": title,
      "objectives": ["เข้าใจตัวแปร", "แก้สมการเชิงเส้น"],
      "mainContent": [
        { "id": "s1", "title": "ตัวแปร", "type": "theory", "content": "...", "duration": 10 },
        { "id": "s2", "title": "สมการ", "type": "example", "content": "...", "duration": 20 }
      ],
      "exercises": [
        { "id": "e1", "type": "multiple-choice", "question": "x + 2 = 5, x = ?", "options": ["1","2","3","4"], "difficulty": "easy", "points": 1, "answerSpace": 1 }
      ],
      "summary": "สรุป"
    })
    .to_string()
  }

  fn client(server: &MockServer, limiter: Arc<Mutex<RateLimiter>>) -> OpenAI {
    OpenAI::new(test_settings(&server.uri()), Prompts::default(), limiter).unwrap()
  }

  fn limiter() -> Arc<Mutex<RateLimiter>> {
    Arc::new(Mutex::new(RateLimiter::new(20, Duration::from_secs(60))))
  }

  fn request() -> GenerationRequest {
    GenerationRequest::new("พีชคณิต", GradeLevel::M1, Amount::Medium, Amount::Medium)
  }

  async fn generate(oa: &OpenAI, model_override: Option<&str>) -> Result<StudySheetContent, AiError> {
    oa.acquire_slot().await;
    oa.generate_study_sheet(&request(), model_override).await
  }

  #[tokio::test]
  async fn parses_valid_completion_and_sends_expected_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("Authorization", "Bearer test-key"))
      .and(header("HTTP-Referer", "https://studysheet.test"))
      .and(header("X-Title", "StudySheet Test"))
      .and(body_partial_json(json!({ "model": "test/model", "response_format": { "type": "json_object" } })))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(&sheet_json("พีชคณิตเบื้องต้น"))))
      .expect(1)
      .mount(&server)
      .await;

    let oa = client(&server, limiter());
    let content = generate(&oa, None).await.unwrap();
    assert_eq!(content.title, "พีชคณิตเบื้องต้น");
    assert_eq!(content.metadata.section_count, 2);
    assert_eq!(content.metadata.exercise_count, 1);
    assert_eq!(content.metadata.activity_count, 0);
    assert_eq!(content.metadata.total_duration, 30);
  }

  #[tokio::test]
  async fn model_override_wins() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(body_partial_json(json!({ "model": "other/model" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion(&sheet_json("t"))))
      .expect(1)
      .mount(&server)
      .await;
    let oa = client(&server, limiter());
    assert!(generate(&oa, Some("other/model")).await.is_ok());
  }

  #[tokio::test]
  async fn maps_status_codes_into_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(
        ResponseTemplate::new(429)
          .insert_header("Retry-After", "7")
          .set_body_json(json!({ "error": { "message": "slow down" } })),
      )
      .mount(&server)
      .await;
    let err = generate(&client(&server, limiter()), None).await.unwrap_err();
    assert_eq!(err.kind, AiErrorKind::RateLimit);
    assert_eq!(err.status, Some(429));
    assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    assert!(err.message.contains("slow down"));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
      .mount(&server)
      .await;
    let err = generate(&client(&server, limiter()), None).await.unwrap_err();
    assert_eq!(err.kind, AiErrorKind::InvalidRequest);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(502))
      .mount(&server)
      .await;
    let err = generate(&client(&server, limiter()), None).await.unwrap_err();
    assert_eq!(err.kind, AiErrorKind::ServerError);
  }

  #[tokio::test]
  async fn non_json_content_is_a_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(completion("Here is your study sheet!")))
      .mount(&server)
      .await;
    let err = generate(&client(&server, limiter()), None).await.unwrap_err();
    assert_eq!(err.kind, AiErrorKind::ServerError);
  }

  #[tokio::test]
  async fn unreachable_host_is_a_network_error() {
    let oa = OpenAI::new(test_settings("http://127.0.0.1:9"), Prompts::default(), limiter()).unwrap();
    let err = generate(&oa, None).await.unwrap_err();
    assert!(matches!(err.kind, AiErrorKind::Network | AiErrorKind::Timeout), "{err}");
  }

  #[tokio::test]
  async fn every_call_takes_a_limiter_slot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;
    let rl = limiter();
    let oa = client(&server, rl.clone());
    let _ = generate(&oa, None).await;
    let _ = generate(&oa, None).await;
    assert_eq!(rl.lock().await.in_window(Instant::now()), 2);
  }
}
