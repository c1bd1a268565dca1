//! Prompt builder: topic + static tables -> system/user prompt pair.

use crate::catalog::{content_profile, exercise_profile, grade_profile};
use crate::config::Prompts;
use crate::domain::GenerationRequest;
use tracing::warn;

use crate::util::{fill_template, unfilled_placeholders};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptPair {
  pub system: String,
  pub user: String,
}

/// Pure and deterministic. The topic is inserted verbatim (trimmed).
pub fn build_prompt(prompts: &Prompts, req: &GenerationRequest) -> PromptPair {
  let grade = grade_profile(req.grade_level);
  let content = content_profile(req.content_amount);
  let exercises = exercise_profile(req.exercise_amount);

  let page_count = content.page_count.to_string();
  let section_count = content.section_count.to_string();
  let exercise_count = exercises.exercise_count.to_string();
  let activity_count = exercises.activity_count.to_string();
  let easy = grade.mix.easy.to_string();
  let medium = grade.mix.medium.to_string();
  let hard = grade.mix.hard.to_string();

  let pairs = [
    ("topic", req.topic.trim()),
    ("grade", grade.label),
    ("age_range", grade.age_range),
    ("grade_guidance", grade.guidance),
    ("content_guidance", content.guidance),
    ("exercise_guidance", exercises.guidance),
    ("page_count", page_count.as_str()),
    ("section_count", section_count.as_str()),
    ("exercise_count", exercise_count.as_str()),
    ("activity_count", activity_count.as_str()),
    ("easy", easy.as_str()),
    ("medium", medium.as_str()),
    ("hard", hard.as_str()),
  ];

  let pair = PromptPair {
    system: fill_template(&prompts.system, &pairs),
    user: fill_template(&prompts.user_template, &pairs),
  };
  // Only reachable with a custom TOML template using an unknown placeholder.
  let mut missing = unfilled_placeholders(&prompts.user_template, &pairs);
  missing.extend(unfilled_placeholders(&prompts.system, &pairs));
  if !missing.is_empty() {
    warn!(target: "studysheet_backend", ?missing, "Prompt template has unresolved placeholders");
  }
  pair
}
