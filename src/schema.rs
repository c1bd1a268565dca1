//! Shape validation for model output.
//!
//! The model's JSON is untrusted. It is parsed into a permissive raw shape,
//! checked for the required top-level fields, then normalized into the typed
//! domain model. Optional lists default to empty; a missing summary becomes a
//! placeholder; items without ids get positional ids.

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{
  Activity, ActivityType, Difficulty, Exercise, ExerciseType, ImageSpec, Section, SectionType,
  StudySheetDraft, MAX_ANSWER_SPACE,
};

pub const SUMMARY_PLACEHOLDER: &str = "สรุปบทเรียน: ทบทวนประเด็นสำคัญจากเนื้อหาข้างต้น";

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
  #[error("response is not valid JSON: {0}")]
  NotJson(String),
  #[error("missing required field `{0}`")]
  MissingField(&'static str),
  #[error("field `{0}` has the wrong shape: {1}")]
  WrongShape(&'static str, String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStudySheet {
  title: Option<String>,
  objectives: Option<serde_json::Value>,
  main_content: Option<serde_json::Value>,
  #[serde(default)]
  exercises: Option<serde_json::Value>,
  #[serde(default)]
  activities: Option<serde_json::Value>,
  #[serde(default)]
  images: Option<serde_json::Value>,
  #[serde(default)]
  summary: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawSection {
  id: Option<String>,
  title: String,
  #[serde(rename = "type")]
  kind: Option<String>,
  content: String,
  duration: Option<u32>,
  key_terms: Option<Vec<String>>,
  note_space: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawExercise {
  id: Option<String>,
  #[serde(rename = "type")]
  kind: Option<String>,
  question: String,
  options: Option<Vec<String>>,
  difficulty: Option<String>,
  points: Option<u32>,
  answer_space: Option<u32>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawActivity {
  id: Option<String>,
  title: String,
  #[serde(rename = "type")]
  kind: Option<String>,
  description: String,
  duration: Option<u32>,
  materials: Vec<String>,
  instructions: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawImage {
  id: Option<String>,
  description: String,
  placement: Option<String>,
  caption: Option<String>,
}

/// Models sometimes wrap JSON in a ```json fence despite the response format hint.
pub fn strip_code_fence(text: &str) -> &str {
  let t = text.trim();
  let Some(rest) = t.strip_prefix("```") else { return t };
  let rest = rest.strip_prefix("json").unwrap_or(rest);
  rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse and normalize model output. `default_minutes` fills missing section durations.
pub fn parse_study_sheet(text: &str, default_minutes: u32) -> Result<StudySheetDraft, SchemaError> {
  let raw: RawStudySheet =
    serde_json::from_str(strip_code_fence(text)).map_err(|e| SchemaError::NotJson(e.to_string()))?;

  let title = raw.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    .ok_or(SchemaError::MissingField("title"))?;
  let objectives: Vec<String> = list_field("objectives", raw.objectives.ok_or(SchemaError::MissingField("objectives"))?)?;
  let sections: Vec<RawSection> = list_field("mainContent", raw.main_content.ok_or(SchemaError::MissingField("mainContent"))?)?;
  if sections.is_empty() {
    return Err(SchemaError::WrongShape("mainContent", "empty list".into()));
  }

  let exercises: Vec<RawExercise> = optional_list("exercises", raw.exercises)?;
  let activities: Vec<RawActivity> = optional_list("activities", raw.activities)?;
  let images: Vec<RawImage> = optional_list("images", raw.images)?;

  let summary = raw.summary.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    .unwrap_or_else(|| SUMMARY_PLACEHOLDER.to_string());

  Ok(StudySheetDraft {
    title,
    objectives: objectives.into_iter().filter(|o| !o.trim().is_empty()).collect(),
    main_content: sections
      .into_iter()
      .enumerate()
      .map(|(i, s)| Section {
        id: s.id.unwrap_or_else(|| format!("section-{}", i + 1)),
        title: s.title,
        kind: s.kind.as_deref().map(section_type).unwrap_or_default(),
        content: s.content,
        duration: s.duration.unwrap_or(default_minutes),
        key_terms: s.key_terms.filter(|k| !k.is_empty()),
        note_space: s.note_space.unwrap_or(false),
      })
      .collect(),
    exercises: exercises
      .into_iter()
      .enumerate()
      .map(|(i, e)| {
        let kind = e.kind.as_deref().map(exercise_type).unwrap_or_default();
        Exercise {
          id: e.id.unwrap_or_else(|| format!("exercise-{}", i + 1)),
          kind,
          question: e.question,
          options: e.options.filter(|o| !o.is_empty()),
          difficulty: e.difficulty.as_deref().map(difficulty).unwrap_or_default(),
          points: e.points.unwrap_or(1),
          answer_space: e.answer_space.unwrap_or(match kind {
            ExerciseType::Essay => 8,
            ExerciseType::ShortAnswer => 3,
            _ => 1,
          }).min(MAX_ANSWER_SPACE),
        }
      })
      .collect(),
    activities: activities
      .into_iter()
      .enumerate()
      .map(|(i, a)| Activity {
        id: a.id.unwrap_or_else(|| format!("activity-{}", i + 1)),
        title: a.title,
        kind: a.kind.as_deref().map(activity_type).unwrap_or_default(),
        description: a.description,
        duration: a.duration.unwrap_or(15),
        materials: a.materials,
        instructions: a.instructions,
      })
      .collect(),
    images: images
      .into_iter()
      .enumerate()
      .map(|(i, img)| ImageSpec {
        id: img.id.unwrap_or_else(|| format!("image-{}", i + 1)),
        description: img.description,
        placement: img.placement.unwrap_or_default(),
        caption: img.caption,
      })
      .collect(),
    summary,
  })
}

fn list_field<T: for<'de> Deserialize<'de>>(name: &'static str, v: serde_json::Value) -> Result<Vec<T>, SchemaError> {
  if !v.is_array() {
    return Err(SchemaError::WrongShape(name, "expected an array".into()));
  }
  serde_json::from_value(v).map_err(|e| SchemaError::WrongShape(name, e.to_string()))
}

fn optional_list<T: for<'de> Deserialize<'de>>(name: &'static str, v: Option<serde_json::Value>) -> Result<Vec<T>, SchemaError> {
  match v {
    None | Some(serde_json::Value::Null) => Ok(Vec::new()),
    Some(v) => list_field(name, v),
  }
}

fn section_type(s: &str) -> SectionType {
  match s.trim().to_lowercase().as_str() {
    "theory" => SectionType::Theory,
    "example" => SectionType::Example,
    "practice" => SectionType::Practice,
    "summary" => SectionType::Summary,
    _ => SectionType::Explanation,
  }
}

fn exercise_type(s: &str) -> ExerciseType {
  match s.trim().to_lowercase().replace('_', "-").as_str() {
    "multiple-choice" => ExerciseType::MultipleChoice,
    "essay" => ExerciseType::Essay,
    "true-false" => ExerciseType::TrueFalse,
    _ => ExerciseType::ShortAnswer,
  }
}

fn difficulty(s: &str) -> Difficulty {
  match s.trim().to_lowercase().as_str() {
    "easy" => Difficulty::Easy,
    "hard" => Difficulty::Hard,
    _ => Difficulty::Medium,
  }
}

fn activity_type(s: &str) -> ActivityType {
  match s.trim().to_lowercase().as_str() {
    "group" => ActivityType::Group,
    "demonstration" => ActivityType::Demonstration,
    "discussion" => ActivityType::Discussion,
    _ => ActivityType::Individual,
  }
}
