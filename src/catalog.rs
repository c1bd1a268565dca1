//! Static configuration tables: grade bands and content/exercise volumes.
//!
//! Pure data. The prompt builder and the fallback generator both read from here,
//! so model output and template output aim at the same targets.

use crate::domain::{Amount, GradeLevel};

/// Percent split of exercise difficulty for a grade band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DifficultyMix {
  pub easy: u8,
  pub medium: u8,
  pub hard: u8,
}

#[derive(Clone, Copy, Debug)]
pub struct GradeProfile {
  pub label: &'static str,
  pub age_range: &'static str,
  /// Vocabulary and complexity guidance given to the model.
  pub guidance: &'static str,
  /// Short label stored in `metadata.difficultyLevel`.
  pub difficulty_label: &'static str,
  pub mix: DifficultyMix,
  /// Sentence used by fallback templates to pitch the explanation.
  pub pitch: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub struct ContentProfile {
  pub page_count: u32,
  pub section_count: usize,
  pub minutes_per_section: u32,
  pub guidance: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub struct ExerciseProfile {
  pub exercise_count: usize,
  pub activity_count: usize,
  pub guidance: &'static str,
}

pub fn grade_profile(grade: GradeLevel) -> GradeProfile {
  match grade {
    GradeLevel::M1 => GradeProfile {
      label: "มัธยมศึกษาปีที่ 1",
      age_range: "12-13 ปี",
      guidance: "ใช้ภาษาง่าย ประโยคสั้น อธิบายศัพท์ใหม่ทุกคำ ยกตัวอย่างจากชีวิตประจำวัน",
      difficulty_label: "พื้นฐาน",
      mix: DifficultyMix { easy: 50, medium: 40, hard: 10 },
      pitch: "อธิบายทีละขั้นด้วยตัวอย่างใกล้ตัว",
    },
    GradeLevel::M2 => GradeProfile {
      label: "มัธยมศึกษาปีที่ 2",
      age_range: "13-14 ปี",
      guidance: "ใช้ภาษาชัดเจน เริ่มใช้ศัพท์เฉพาะพร้อมคำอธิบาย เชื่อมโยงกับความรู้เดิม",
      difficulty_label: "พื้นฐาน",
      mix: DifficultyMix { easy: 40, medium: 45, hard: 15 },
      pitch: "เชื่อมโยงกับสิ่งที่เรียนมาแล้วและยกตัวอย่างประกอบ",
    },
    GradeLevel::M3 => GradeProfile {
      label: "มัธยมศึกษาปีที่ 3",
      age_range: "14-15 ปี",
      guidance: "ใช้ศัพท์เฉพาะได้มากขึ้น ฝึกการให้เหตุผลและเปรียบเทียบ",
      difficulty_label: "ปานกลาง",
      mix: DifficultyMix { easy: 35, medium: 45, hard: 20 },
      pitch: "ฝึกให้เหตุผลและเปรียบเทียบแนวคิด",
    },
    GradeLevel::M4 => GradeProfile {
      label: "มัธยมศึกษาปีที่ 4",
      age_range: "15-16 ปี",
      guidance: "ใช้ศัพท์วิชาการ เน้นการวิเคราะห์และการประยุกต์ใช้",
      difficulty_label: "ปานกลาง",
      mix: DifficultyMix { easy: 30, medium: 45, hard: 25 },
      pitch: "วิเคราะห์หลักการและนำไปประยุกต์ใช้",
    },
    GradeLevel::M5 => GradeProfile {
      label: "มัธยมศึกษาปีที่ 5",
      age_range: "16-17 ปี",
      guidance: "ใช้ภาษาวิชาการเต็มรูปแบบ เน้นการวิเคราะห์เชิงลึกและการสังเคราะห์",
      difficulty_label: "สูง",
      mix: DifficultyMix { easy: 25, medium: 45, hard: 30 },
      pitch: "วิเคราะห์เชิงลึกและสังเคราะห์ความรู้",
    },
    GradeLevel::M6 => GradeProfile {
      label: "มัธยมศึกษาปีที่ 6",
      age_range: "17-18 ปี",
      guidance: "ระดับเตรียมมหาวิทยาลัย เน้นการประเมินค่า การคิดเชิงวิพากษ์ และโจทย์ประยุกต์",
      difficulty_label: "สูง",
      mix: DifficultyMix { easy: 20, medium: 45, hard: 35 },
      pitch: "คิดเชิงวิพากษ์และเตรียมพร้อมสู่ระดับอุดมศึกษา",
    },
  }
}

pub fn content_profile(amount: Amount) -> ContentProfile {
  match amount {
    Amount::Low => ContentProfile {
      page_count: 2,
      section_count: 3,
      minutes_per_section: 10,
      guidance: "เนื้อหากระชับ 2 หน้า 3 หัวข้อ เน้นแนวคิดหลัก",
    },
    Amount::Medium => ContentProfile {
      page_count: 4,
      section_count: 5,
      minutes_per_section: 15,
      guidance: "เนื้อหาปานกลาง 4 หน้า 5 หัวข้อ มีตัวอย่างประกอบทุกหัวข้อ",
    },
    Amount::High => ContentProfile {
      page_count: 6,
      section_count: 7,
      minutes_per_section: 20,
      guidance: "เนื้อหาละเอียด 6 หน้า 7 หัวข้อ มีตัวอย่างและกรณีศึกษา",
    },
  }
}

pub fn exercise_profile(amount: Amount) -> ExerciseProfile {
  match amount {
    Amount::Low => ExerciseProfile {
      exercise_count: 3,
      activity_count: 1,
      guidance: "แบบฝึกหัด 3 ข้อ กิจกรรม 1 กิจกรรม",
    },
    Amount::Medium => ExerciseProfile {
      exercise_count: 6,
      activity_count: 2,
      guidance: "แบบฝึกหัด 6 ข้อ ผสมหลายรูปแบบ กิจกรรม 2 กิจกรรม",
    },
    Amount::High => ExerciseProfile {
      exercise_count: 10,
      activity_count: 3,
      guidance: "แบบฝึกหัด 10 ข้อ ครบทุกรูปแบบ กิจกรรม 3 กิจกรรม",
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn difficulty_mixes_sum_to_one_hundred() {
    for g in GradeLevel::ALL {
      let m = grade_profile(g).mix;
      assert_eq!(m.easy as u32 + m.medium as u32 + m.hard as u32, 100, "{:?}", g);
    }
  }

  #[test]
  fn volumes_grow_with_amount() {
    let counts: Vec<_> = Amount::ALL.iter().map(|a| content_profile(*a).section_count).collect();
    assert!(counts.windows(2).all(|w| w[0] < w[1]));
    let ex: Vec<_> = Amount::ALL.iter().map(|a| exercise_profile(*a).exercise_count).collect();
    assert!(ex.windows(2).all(|w| w[0] < w[1]));
  }
}
