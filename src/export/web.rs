//! Web export: a self-contained HTML page that can be shared by link.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tera::{Context, Tera};

use crate::config::Branding;
use crate::domain::StudySheetContent;
use crate::error::ExportError;

use super::{export_file_name, ExportArtifact, MIME_HTML};

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="th">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="generator" content="{{ branding.app_title }}">
<title>{{ content.title }}</title>
<style>
  body { font-family: "Sarabun", "Noto Sans Thai", sans-serif; max-width: 860px; margin: 0 auto; padding: 0 16px 48px; color: #1f2937; }
  header.brand { background: rgb({{ branding.header_color.0 }}, {{ branding.header_color.1 }}, {{ branding.header_color.2 }}); color: #fff; padding: 12px 16px; margin: 0 -16px 24px; }
  section { margin-bottom: 24px; }
  .meta { color: #6b7280; font-size: 0.9em; }
  .lines { border-bottom: 1px dashed #9ca3af; height: 1.6em; }
  footer { margin-top: 48px; color: #6b7280; font-size: 0.8em; text-align: center; }
</style>
</head>
<body>
<header class="brand">{{ branding.logo_text }}</header>
<h1>{{ content.title }}</h1>
<p class="meta">{{ content.metadata.difficultyLevel }} · {{ content.metadata.totalDuration }} นาที · {{ content.metadata.pageCount }} หน้า</p>

{% if content.objectives %}
<h2>จุดประสงค์การเรียนรู้</h2>
<ol>{% for o in content.objectives %}<li>{{ o }}</li>{% endfor %}</ol>
{% endif %}

{% for s in content.mainContent %}
<section id="{{ s.id }}">
  <h2>{{ loop.index }}. {{ s.title }}</h2>
  <p class="meta">{{ s.duration }} นาที</p>
  <p>{{ s.content }}</p>
  {% if s.keyTerms %}<p><strong>คำสำคัญ:</strong> {{ s.keyTerms | join(sep=", ") }}</p>{% endif %}
  {% if s.noteSpace %}<div class="lines"></div><div class="lines"></div><div class="lines"></div>{% endif %}
</section>
{% endfor %}

{% if content.exercises %}
<h2>แบบฝึกหัด</h2>
{% for e in content.exercises %}
<div class="exercise" id="{{ e.id }}">
  <p>{{ e.question }} <span class="meta">({{ e.points }} คะแนน)</span></p>
  {% if e.options %}<ul>{% for opt in e.options %}<li>{{ opt }}</li>{% endfor %}</ul>
  {% else %}{% for i in range(end=e.answerSpace) %}<div class="lines"></div>{% endfor %}{% endif %}
</div>
{% endfor %}
{% endif %}

{% if content.activities %}
<h2>กิจกรรม</h2>
{% for a in content.activities %}
<section id="{{ a.id }}">
  <h3>{{ a.title }} <span class="meta">({{ a.duration }} นาที)</span></h3>
  <p>{{ a.description }}</p>
  {% if a.materials %}<p><strong>อุปกรณ์:</strong> {{ a.materials | join(sep=", ") }}</p>{% endif %}
  {% if a.instructions %}<ol>{% for step in a.instructions %}<li>{{ step }}</li>{% endfor %}</ol>{% endif %}
</section>
{% endfor %}
{% endif %}

<h2>สรุป</h2>
<p>{{ content.summary }}</p>

<footer>{{ branding.footer_text }} · {{ exported_at }}</footer>
</body>
</html>
"#;

#[derive(Serialize)]
struct PageContext<'a> {
  content: &'a StudySheetContent,
  branding: BrandingView<'a>,
  exported_at: String,
}

#[derive(Serialize)]
struct BrandingView<'a> {
  app_title: &'a str,
  logo_text: &'a str,
  header_color: (u8, u8, u8),
  footer_text: &'a str,
}

pub fn render_web_page(content: &StudySheetContent, branding: &Branding, now: DateTime<Utc>) -> Result<String, ExportError> {
  let [r, g, b] = branding.header_color;
  let ctx = PageContext {
    content,
    branding: BrandingView {
      app_title: &branding.app_title,
      logo_text: &branding.logo_text,
      header_color: (r, g, b),
      footer_text: &branding.footer_text,
    },
    exported_at: now.format("%Y-%m-%d %H:%M UTC").to_string(),
  };
  let context = Context::from_serialize(&ctx)?;
  Ok(Tera::one_off(PAGE_TEMPLATE, &context, true)?)
}

pub fn build_web_bundle(content: &StudySheetContent, branding: &Branding, now: DateTime<Utc>) -> Result<ExportArtifact, ExportError> {
  let html = render_web_page(content, branding, now)?;
  Ok(ExportArtifact {
    file_name: export_file_name(&content.title, "html", now.date_naive()),
    mime: MIME_HTML,
    bytes: html.into_bytes(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Amount, GenerationRequest, GradeLevel};
  use crate::fallback::{generate_fallback_content, FallbackOptions};

  #[test]
  fn renders_every_part_of_the_sheet() {
    let req = GenerationRequest::new("พีชคณิต", GradeLevel::M1, Amount::Low, Amount::Medium);
    let content = generate_fallback_content(&req, &FallbackOptions::default());
    let html = render_web_page(&content, &Branding::default(), Utc::now()).unwrap();
    assert!(html.contains(&content.title));
    for s in &content.main_content {
      assert!(html.contains(&format!("id=\"{}\"", s.id)));
    }
    assert!(html.contains("แบบฝึกหัด"));
    assert!(html.contains("กิจกรรม"));
    assert!(html.contains("rgb(37, 99, 235)"));
  }

  #[test]
  fn user_text_is_escaped() {
    let mut content = crate::fallback::generate_emergency_content("x");
    content.title = "<script>alert(1)</script>".into();
    let artifact = build_web_bundle(&content, &Branding::default(), Utc::now()).unwrap();
    let html = String::from_utf8(artifact.bytes).unwrap();
    assert!(!html.contains("<script>alert(1)</script>"));
    assert!(html.contains("&lt;script&gt;"));
    assert_eq!(artifact.mime, MIME_HTML);
    assert!(artifact.file_name.ends_with(".html"));
  }
}
