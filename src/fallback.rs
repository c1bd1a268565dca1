//! Deterministic template content used when the AI path is unavailable.
//!
//! Two tiers:
//!   - `generate_fallback_content`: a full sheet sized by the same tables the
//!     prompt uses, with the topic substituted into static templates.
//!   - `generate_emergency_content`: one section, one exercise. Last resort.
//!
//! Both are pure: same input, same output, no I/O.

use crate::catalog::{content_profile, exercise_profile, grade_profile, DifficultyMix};
use crate::domain::{
  Activity, ActivityType, Difficulty, Exercise, ExerciseType, GenerationRequest, ImageSpec, Section,
  SectionType, StudySheetContent, StudySheetDraft,
};
use crate::util::fill_template;

pub const DEFAULT_TOPIC: &str = "หัวข้อทั่วไป";

#[derive(Clone, Debug)]
pub struct FallbackOptions {
  pub include_activities: bool,
  pub include_images: bool,
}

impl Default for FallbackOptions {
  fn default() -> Self {
    Self { include_activities: true, include_images: true }
  }
}

struct SectionTemplate {
  kind: SectionType,
  title: &'static str,
  body: &'static str,
  key_terms: &'static [&'static str],
}

const SECTION_TEMPLATES: &[SectionTemplate] = &[
  SectionTemplate {
    kind: SectionType::Theory,
    title: "ความรู้พื้นฐานเกี่ยวกับ{topic}",
    body: "{topic} เป็นเนื้อหาที่นักเรียนระดับ{grade}ควรเข้าใจหลักการสำคัญ ในหัวข้อนี้เราจะ{pitch} \
           เริ่มจากความหมาย องค์ประกอบ และเหตุผลที่{topic}มีความสำคัญต่อการเรียนรู้ในระดับต่อไป",
    key_terms: &["นิยาม", "องค์ประกอบ", "หลักการ"],
  },
  SectionTemplate {
    kind: SectionType::Explanation,
    title: "หลักการและแนวคิดสำคัญของ{topic}",
    body: "แนวคิดหลักของ{topic}สามารถแบ่งออกเป็นประเด็นย่อยที่เชื่อมโยงกัน \
           นักเรียนควรสังเกตความสัมพันธ์ระหว่างแต่ละประเด็น และลองอธิบายด้วยคำพูดของตนเอง",
    key_terms: &["แนวคิดหลัก", "ความสัมพันธ์"],
  },
  SectionTemplate {
    kind: SectionType::Example,
    title: "ตัวอย่างเกี่ยวกับ{topic}",
    body: "ลองพิจารณาตัวอย่างของ{topic}ที่พบได้ในชีวิตประจำวัน \
           ระบุว่าตัวอย่างนี้ใช้หลักการใด และผลลัพธ์ที่ได้เป็นอย่างไร",
    key_terms: &["ตัวอย่าง", "การประยุกต์"],
  },
  SectionTemplate {
    kind: SectionType::Practice,
    title: "ฝึกทักษะเรื่อง{topic}",
    body: "ฝึกนำความรู้เรื่อง{topic}ไปใช้แก้ปัญหาทีละขั้นตอน \
           เขียนวิธีคิดของตนเองลงในพื้นที่ว่าง แล้วตรวจสอบกับเพื่อน",
    key_terms: &[],
  },
  SectionTemplate {
    kind: SectionType::Explanation,
    title: "ข้อควรระวังและความเข้าใจผิดที่พบบ่อยใน{topic}",
    body: "นักเรียนหลายคนมักสับสนในบางประเด็นของ{topic} \
           ให้ทบทวนนิยามและตรวจสอบเงื่อนไขก่อนสรุปผลทุกครั้ง",
    key_terms: &["ข้อควรระวัง"],
  },
  SectionTemplate {
    kind: SectionType::Example,
    title: "กรณีศึกษา: {topic}ในสถานการณ์จริง",
    body: "อ่านกรณีศึกษาต่อไปนี้และวิเคราะห์ว่า{topic}มีบทบาทอย่างไร \
           มีทางเลือกอื่นหรือไม่ และทางเลือกใดเหมาะสมที่สุด",
    key_terms: &["กรณีศึกษา", "การวิเคราะห์"],
  },
];

const SUMMARY_SECTION: SectionTemplate = SectionTemplate {
  kind: SectionType::Summary,
  title: "สรุปเรื่อง{topic}",
  body: "ทบทวนประเด็นสำคัญของ{topic}: ความหมาย หลักการ ตัวอย่าง และการนำไปใช้ \
         จดบันทึกสิ่งที่ยังไม่เข้าใจเพื่อถามครูในคาบถัดไป",
  key_terms: &[],
};

const EXERCISE_TEMPLATES: &[(ExerciseType, &str)] = &[
  (ExerciseType::MultipleChoice, "ข้อใดอธิบายความหมายของ{topic}ได้ถูกต้องที่สุด"),
  (ExerciseType::TrueFalse, "{topic}เป็นความรู้ที่นำไปใช้ในชีวิตประจำวันไม่ได้ (ถูก/ผิด)"),
  (ExerciseType::ShortAnswer, "จงอธิบายหลักการสำคัญของ{topic}มาพอสังเขป"),
  (ExerciseType::MultipleChoice, "ข้อใดเป็นตัวอย่างของการนำ{topic}ไปใช้"),
  (ExerciseType::ShortAnswer, "ยกตัวอย่าง{topic}ที่พบในชีวิตประจำวันมา 2 ตัวอย่าง พร้อมเหตุผล"),
  (ExerciseType::Essay, "วิเคราะห์ว่า{topic}มีความสำคัญต่อการเรียนรู้ของนักเรียนอย่างไร"),
];

const ACTIVITY_TEMPLATES: &[(ActivityType, &str, &str)] = &[
  (ActivityType::Group, "แผนผังความคิดเรื่อง{topic}", "แบ่งกลุ่ม 4-5 คน สร้างแผนผังความคิดสรุปเนื้อหาเรื่อง{topic}"),
  (ActivityType::Discussion, "อภิปราย: {topic}รอบตัวเรา", "ร่วมกันอภิปรายว่าพบ{topic}ที่ใดบ้างในชีวิตประจำวัน"),
  (ActivityType::Individual, "บันทึกการเรียนรู้เรื่อง{topic}", "เขียนบันทึกสั้นๆ สรุปสิ่งที่ได้เรียนรู้และคำถามที่ยังสงสัย"),
];

fn topic_or_default(topic: &str) -> &str {
  let t = topic.trim();
  if t.is_empty() { DEFAULT_TOPIC } else { t }
}

/// Spread `n` exercises over easy/medium/hard by the grade's percentage mix.
fn difficulty_plan(n: usize, mix: DifficultyMix) -> Vec<Difficulty> {
  let easy = (n * mix.easy as usize + 50) / 100;
  let hard = ((n * mix.hard as usize + 50) / 100).min(n.saturating_sub(easy));
  let medium = n - easy - hard;
  std::iter::repeat(Difficulty::Easy)
    .take(easy)
    .chain(std::iter::repeat(Difficulty::Medium).take(medium))
    .chain(std::iter::repeat(Difficulty::Hard).take(hard))
    .collect()
}

fn points_for(d: Difficulty) -> u32 {
  match d {
    Difficulty::Easy => 1,
    Difficulty::Medium => 2,
    Difficulty::Hard => 3,
  }
}

/// Full template sheet sized by the request's grade and amounts.
pub fn generate_fallback_content(req: &GenerationRequest, options: &FallbackOptions) -> StudySheetContent {
  let topic = topic_or_default(&req.topic);
  let grade = grade_profile(req.grade_level);
  let content = content_profile(req.content_amount);
  let volume = exercise_profile(req.exercise_amount);
  let vars = [("topic", topic), ("grade", grade.label), ("pitch", grade.pitch)];

  // Body sections cycle through the templates; the last slot is always the summary.
  let body_count = content.section_count.saturating_sub(1);
  let mut main_content: Vec<Section> = (0..body_count)
    .map(|i| {
      let tpl = &SECTION_TEMPLATES[i % SECTION_TEMPLATES.len()];
      render_section(tpl, i, &vars, content.minutes_per_section)
    })
    .collect();
  main_content.push(render_section(&SUMMARY_SECTION, body_count, &vars, content.minutes_per_section / 2));

  let exercises = difficulty_plan(volume.exercise_count, grade.mix)
    .into_iter()
    .enumerate()
    .map(|(i, difficulty)| {
      let (kind, question) = EXERCISE_TEMPLATES[i % EXERCISE_TEMPLATES.len()];
      render_exercise(i, kind, question, difficulty, &vars)
    })
    .collect();

  let activities = if options.include_activities {
    (0..volume.activity_count)
      .map(|i| {
        let (kind, title, description) = ACTIVITY_TEMPLATES[i % ACTIVITY_TEMPLATES.len()];
        Activity {
          id: format!("activity-{}", i + 1),
          title: fill_template(title, &vars),
          kind,
          description: fill_template(description, &vars),
          duration: 20,
          materials: vec!["กระดาษ A4".into(), "ปากกาสี".into()],
          instructions: vec![
            "อ่านเนื้อหาที่เกี่ยวข้องอีกครั้ง".into(),
            fill_template("ทำกิจกรรมตามหัวข้อ{topic}ภายในเวลาที่กำหนด", &vars),
            "นำเสนอผลงานหรือแลกเปลี่ยนกับเพื่อน".into(),
          ],
        }
      })
      .collect()
  } else {
    Vec::new()
  };

  let images = if options.include_images {
    vec![ImageSpec {
      id: "image-1".into(),
      description: fill_template("แผนภาพสรุปแนวคิดหลักของ{topic}", &vars),
      placement: "section-1".into(),
      caption: Some(fill_template("ภาพที่ 1 แนวคิดหลักของ{topic}", &vars)),
    }]
  } else {
    Vec::new()
  };

  StudySheetDraft {
    title: fill_template("เอกสารประกอบการเรียน เรื่อง {topic} ({grade})", &vars),
    objectives: vec![
      fill_template("อธิบายความหมายและหลักการของ{topic}ได้", &vars),
      fill_template("ยกตัวอย่างการนำ{topic}ไปใช้ในชีวิตประจำวันได้", &vars),
      fill_template("แก้โจทย์และวิเคราะห์สถานการณ์ที่เกี่ยวข้องกับ{topic}ได้", &vars),
    ],
    main_content,
    exercises,
    activities,
    images,
    summary: fill_template(
      "ในบทเรียนนี้นักเรียนได้ศึกษา{topic} ตั้งแต่ความหมาย หลักการ ตัวอย่าง จนถึงการนำไปใช้ \
       ควรทบทวนแบบฝึกหัดและจดบันทึกประเด็นที่ยังไม่เข้าใจ",
      &vars,
    ),
  }
  .finish(content.page_count, grade.difficulty_label)
}

/// Minimal sheet: one section, one exercise, no activities.
pub fn generate_emergency_content(topic: &str) -> StudySheetContent {
  let topic = topic_or_default(topic);
  let vars = [("topic", topic)];
  StudySheetDraft {
    title: emergency_title(topic),
    objectives: vec![fill_template("ทำความเข้าใจพื้นฐานของ{topic}", &vars)],
    main_content: vec![Section {
      id: "section-1".into(),
      title: fill_template("ความรู้เบื้องต้นเรื่อง{topic}", &vars),
      kind: SectionType::Theory,
      content: fill_template(
        "เนื้อหาเรื่อง{topic}ฉบับย่อ ใช้สำหรับทบทวนเบื้องต้นระหว่างที่ระบบสร้างเนื้อหาฉบับเต็มไม่พร้อมใช้งาน",
        &vars,
      ),
      duration: 15,
      key_terms: None,
      note_space: true,
    }],
    exercises: vec![Exercise {
      id: "exercise-1".into(),
      kind: ExerciseType::ShortAnswer,
      question: fill_template("สรุปสิ่งที่นักเรียนรู้เกี่ยวกับ{topic}ด้วยคำพูดของตนเอง", &vars),
      options: None,
      difficulty: Difficulty::Easy,
      points: 1,
      answer_space: 5,
    }],
    activities: Vec::new(),
    images: Vec::new(),
    summary: fill_template("ทบทวนความหมายและความสำคัญของ{topic}", &vars),
  }
  .finish(1, "พื้นฐาน")
}

pub fn emergency_title(topic: &str) -> String {
  format!("เอกสารประกอบการเรียน: {}", topic_or_default(topic))
}

fn render_section(tpl: &SectionTemplate, index: usize, vars: &[(&str, &str)], minutes: u32) -> Section {
  Section {
    id: format!("section-{}", index + 1),
    title: fill_template(tpl.title, vars),
    kind: tpl.kind,
    content: fill_template(tpl.body, vars),
    duration: minutes.max(5),
    key_terms: if tpl.key_terms.is_empty() {
      None
    } else {
      Some(tpl.key_terms.iter().map(|s| s.to_string()).collect())
    },
    note_space: matches!(tpl.kind, SectionType::Practice | SectionType::Summary),
  }
}

fn render_exercise(index: usize, kind: ExerciseType, question: &str, difficulty: Difficulty, vars: &[(&str, &str)]) -> Exercise {
  let options = match kind {
    ExerciseType::MultipleChoice => Some(vec![
      fill_template("ก. นิยามที่ถูกต้องของ{topic}", vars),
      "ข. ข้อความที่ไม่เกี่ยวข้อง".to_string(),
      "ค. ข้อความที่ถูกเพียงบางส่วน".to_string(),
      "ง. ไม่มีข้อใดถูก".to_string(),
    ]),
    ExerciseType::TrueFalse => Some(vec!["ถูก".to_string(), "ผิด".to_string()]),
    _ => None,
  };
  Exercise {
    id: format!("exercise-{}", index + 1),
    kind,
    question: format!("{}. {}", index + 1, fill_template(question, vars)),
    options,
    difficulty,
    points: points_for(difficulty),
    answer_space: match kind {
      ExerciseType::Essay => 8,
      ExerciseType::ShortAnswer => 4,
      _ => 1,
    },
  }
}
