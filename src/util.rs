//! Small utility helpers used across modules.

use std::time::Duration;

/// Very small and safe string templating.
/// Expands `{key}` tokens found in the template in one left-to-right pass.
/// Inserted values are never rescanned, so a value may itself contain braces.
/// Tokens without a matching key are kept as-is.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(start) = rest.find('{') {
    out.push_str(&rest[..start]);
    let after = &rest[start + 1..];
    let hit = after.find('}').and_then(|end| {
      let key = &after[..end];
      pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| (end, *v))
    });
    match hit {
      Some((end, value)) => {
        out.push_str(value);
        rest = &after[end + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// `{identifier}` tokens in the template that no pair fills.
/// JSON braces (`{"a": 1}`) and empty braces are not treated as placeholders.
pub fn unfilled_placeholders<'a>(tpl: &'a str, pairs: &[(&str, &str)]) -> Vec<&'a str> {
  let mut missing = Vec::new();
  let mut rest = tpl;
  while let Some(start) = rest.find('{') {
    let after = &rest[start + 1..];
    match after.find('}') {
      Some(end) => {
        let inner = &after[..end];
        let is_token = !inner.is_empty() && inner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if is_token && !pairs.iter().any(|(k, _)| *k == inner) {
          missing.push(inner);
          rest = &after[end + 1..];
        } else {
          rest = after;
        }
      }
      None => break,
    }
  }
  missing
}

/// True if the text still contains a `{identifier}` token.
pub fn has_unresolved_placeholders(text: &str) -> bool {
  !unfilled_placeholders(text, &[]).is_empty()
}

/// True if the char belongs to the Thai block (U+0E00..U+0E7F).
pub fn is_thai(ch: char) -> bool {
  ('\u{0E00}'..='\u{0E7F}').contains(&ch)
}

/// Turn a free-form title into a path-safe file stem.
/// Keeps ASCII alphanumerics and Thai letters, folds whitespace/separators into '-'.
pub fn sanitize_file_stem(title: &str) -> String {
  let mut out = String::with_capacity(title.len());
  for ch in title.trim().chars() {
    if ch.is_ascii_alphanumeric() || is_thai(ch) || ch == '_' {
      out.push(ch);
    } else if (ch.is_whitespace() || ch == '-') && !out.ends_with('-') && !out.is_empty() {
      out.push('-');
    }
  }
  let trimmed = out.trim_end_matches('-');
  if trimmed.is_empty() { "studysheet".to_string() } else { trimmed.to_string() }
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub fn millis_u64(d: Duration) -> u64 {
  u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut cut = max;
  while !s.is_char_boundary(cut) { cut -= 1; }
  format!("{}… ({} bytes total)", &s[..cut], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_every_occurrence() {
    let out = fill_template("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x then y");
  }

  #[test]
  fn inserted_values_are_not_rescanned() {
    let pairs = [("topic", "{grade}"), ("grade", "ม.1")];
    assert_eq!(fill_template("{topic} / {grade}", &pairs), "{grade} / ม.1");
    assert_eq!(fill_template("{topic}", &[("topic", "{x}")]), "{x}");
    assert_eq!(fill_template("{unknown} {a}", &[("a", "1")]), "{unknown} 1");
    assert_eq!(fill_template(r#"{"title": "{a}"}"#, &[("a", "t")]), r#"{"title": "t"}"#);
  }

  #[test]
  fn unfilled_placeholders_only_looks_at_the_template() {
    assert!(unfilled_placeholders("{topic} {grade}", &[("topic", ""), ("grade", "")]).is_empty());
    assert_eq!(unfilled_placeholders("{topic} {level}", &[("topic", "")]), vec!["level"]);
    assert!(unfilled_placeholders(r#"{"a": {b}}"#, &[("b", "")]).is_empty());
  }

  #[test]
  fn detects_leftover_placeholders_but_not_json() {
    assert!(has_unresolved_placeholders("hello {topic}"));
    assert!(!has_unresolved_placeholders(r#"return {"title": "x"}"#));
    assert!(!has_unresolved_placeholders("no braces here"));
    assert!(!has_unresolved_placeholders("dangling { brace"));
  }

  #[test]
  fn sanitize_keeps_thai_and_ascii() {
    assert_eq!(sanitize_file_stem("พีชคณิต ม.1: บทที่ 2"), "พีชคณิต-ม1-บทที่-2");
    assert_eq!(sanitize_file_stem("../../etc/passwd"), "etcpasswd");
    assert_eq!(sanitize_file_stem("  ///  "), "studysheet");
  }

  #[test]
  fn millis_saturate_instead_of_wrapping() {
    assert_eq!(millis_u64(Duration::from_millis(1500)), 1500);
    assert_eq!(millis_u64(Duration::MAX), u64::MAX);
  }

  #[test]
  fn truncation_respects_char_boundaries() {
    let s = "พีชคณิตพีชคณิต";
    let out = trunc_for_log(s, 4);
    assert!(out.starts_with('พ'));
    assert!(out.contains("bytes total"));
  }
}
