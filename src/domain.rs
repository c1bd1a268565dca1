//! Domain models: generation requests, study sheet content and its parts.
//!
//! Serialized shapes use camelCase keys so the browser UI can consume them as-is.
//! Grade and amount enums serialize to the Thai labels the form uses.

use serde::{Deserialize, Serialize};

/// Six secondary-school grade bands.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GradeLevel {
  #[serde(rename = "ม.1")] M1,
  #[serde(rename = "ม.2")] M2,
  #[serde(rename = "ม.3")] M3,
  #[serde(rename = "ม.4")] M4,
  #[serde(rename = "ม.5")] M5,
  #[serde(rename = "ม.6")] M6,
}

impl GradeLevel {
  pub const ALL: [GradeLevel; 6] = [Self::M1, Self::M2, Self::M3, Self::M4, Self::M5, Self::M6];

  pub fn label(&self) -> &'static str {
    match self {
      Self::M1 => "ม.1",
      Self::M2 => "ม.2",
      Self::M3 => "ม.3",
      Self::M4 => "ม.4",
      Self::M5 => "ม.5",
      Self::M6 => "ม.6",
    }
  }
}

/// Volume selector shared by content and exercise amounts.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Amount {
  #[serde(rename = "น้อย")] Low,
  #[serde(rename = "ปานกลาง")] Medium,
  #[serde(rename = "มาก")] High,
}

impl Amount {
  pub const ALL: [Amount; 3] = [Self::Low, Self::Medium, Self::High];

  pub fn label(&self) -> &'static str {
    match self {
      Self::Low => "น้อย",
      Self::Medium => "ปานกลาง",
      Self::High => "มาก",
    }
  }
}

/// Immutable input built by the form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
  pub topic: String,
  pub grade_level: GradeLevel,
  pub content_amount: Amount,
  pub exercise_amount: Amount,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,
}

pub const MAX_TOPIC_CHARS: usize = 200;
/// Upper bound on answer lines per exercise; renderers draw one line per unit.
pub const MAX_ANSWER_SPACE: u32 = 20;

impl GenerationRequest {
  pub fn new(topic: impl Into<String>, grade_level: GradeLevel, content_amount: Amount, exercise_amount: Amount) -> Self {
    Self { topic: topic.into(), grade_level, content_amount, exercise_amount, model: None }
  }

  /// Form-level validation. Returns a user-facing reason on failure.
  pub fn validate(&self) -> Result<(), String> {
    let topic = self.topic.trim();
    if topic.is_empty() {
      return Err("กรุณาระบุหัวข้อ (topic is required)".into());
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
      return Err(format!("หัวข้อยาวเกินไป (topic exceeds {} characters)", MAX_TOPIC_CHARS));
    }
    Ok(())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
  Theory,
  #[default]
  Explanation,
  Example,
  Practice,
  Summary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Section {
  pub id: String,
  pub title: String,
  #[serde(rename = "type")]
  pub kind: SectionType,
  pub content: String,
  /// Minutes.
  pub duration: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key_terms: Option<Vec<String>>,
  #[serde(default)]
  pub note_space: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseType {
  MultipleChoice,
  #[default]
  ShortAnswer,
  Essay,
  TrueFalse,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
  pub id: String,
  #[serde(rename = "type")]
  pub kind: ExerciseType,
  pub question: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub difficulty: Difficulty,
  pub points: u32,
  /// Number of ruled answer lines.
  pub answer_space: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
  Group,
  #[default]
  Individual,
  Demonstration,
  Discussion,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
  pub id: String,
  pub title: String,
  #[serde(rename = "type")]
  pub kind: ActivityType,
  pub description: String,
  pub duration: u32,
  #[serde(default)]
  pub materials: Vec<String>,
  #[serde(default)]
  pub instructions: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
  pub id: String,
  pub description: String,
  #[serde(default)]
  pub placement: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub caption: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
  pub page_count: u32,
  /// Minutes across sections and activities.
  pub total_duration: u32,
  pub difficulty_level: String,
  pub section_count: usize,
  pub exercise_count: usize,
  pub activity_count: usize,
}

/// Everything except metadata. This is what the model returns and what the
/// fallback templates produce before counting.
#[derive(Clone, Debug, Default)]
pub struct StudySheetDraft {
  pub title: String,
  pub objectives: Vec<String>,
  pub main_content: Vec<Section>,
  pub exercises: Vec<Exercise>,
  pub activities: Vec<Activity>,
  pub images: Vec<ImageSpec>,
  pub summary: String,
}

impl StudySheetDraft {
  /// The only constructor path for finished content, so counts always match.
  pub fn finish(self, page_count: u32, difficulty_level: impl Into<String>) -> StudySheetContent {
    let mut content = StudySheetContent {
      title: self.title,
      objectives: self.objectives,
      main_content: self.main_content,
      exercises: self.exercises,
      activities: self.activities,
      images: self.images,
      summary: self.summary,
      metadata: Metadata {
        page_count,
        total_duration: 0,
        difficulty_level: difficulty_level.into(),
        section_count: 0,
        exercise_count: 0,
        activity_count: 0,
      },
    };
    content.recompute_metadata();
    content
  }
}

/// Canonical output artifact.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudySheetContent {
  pub title: String,
  pub objectives: Vec<String>,
  pub main_content: Vec<Section>,
  #[serde(default)]
  pub exercises: Vec<Exercise>,
  #[serde(default)]
  pub activities: Vec<Activity>,
  #[serde(default)]
  pub images: Vec<ImageSpec>,
  #[serde(default)]
  pub summary: String,
  pub metadata: Metadata,
}

impl StudySheetContent {
  /// Re-derive counts and total duration from the lists, and clamp answer space.
  /// Called after construction and on content coming back from the editor.
  pub fn recompute_metadata(&mut self) {
    for e in &mut self.exercises {
      e.answer_space = e.answer_space.min(MAX_ANSWER_SPACE);
    }
    self.metadata.section_count = self.main_content.len();
    self.metadata.exercise_count = self.exercises.len();
    self.metadata.activity_count = self.activities.len();
    self.metadata.total_duration = self
      .main_content
      .iter()
      .map(|s| s.duration)
      .chain(self.activities.iter().map(|a| a.duration))
      .fold(0u32, u32::saturating_add);
  }

  pub fn counts_consistent(&self) -> bool {
    self.metadata.section_count == self.main_content.len()
      && self.metadata.exercise_count == self.exercises.len()
      && self.metadata.activity_count == self.activities.len()
  }
}

/// Derived on demand; never persisted.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
  pub configured: bool,
  pub rate_limit_available: bool,
  pub wait_time_ms: u64,
}
