//! Rendering-environment capabilities.
//!
//! The pipeline only consumes `DeviceCapabilities`; user-agent sniffing is
//! confined to `from_user_agent`, called at the HTTP edge.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
  /// Memory/CPU constrained (phones, tablets): capture at a reduced scale.
  pub constrained: bool,
  /// False for browsers known to fail PDF export.
  pub supported: bool,
}

impl Default for DeviceCapabilities {
  fn default() -> Self {
    Self::desktop()
  }
}

const MOBILE_MARKERS: &[&str] = &["android", "iphone", "ipad", "ipod", "mobile", "blackberry", "iemobile", "opera mini"];

impl DeviceCapabilities {
  pub fn desktop() -> Self {
    Self { constrained: false, supported: true }
  }

  pub fn from_user_agent(ua: &str) -> Self {
    let ua = ua.to_lowercase();
    let constrained = MOBILE_MARKERS.iter().any(|m| ua.contains(m));

    let old_ios = ["iphone os ", "cpu os "]
      .iter()
      .filter_map(|m| major_after(&ua, m))
      .any(|v| v < 12);
    let old_android = major_after(&ua, "android ").is_some_and(|v| v < 5);
    let unsupported = old_ios || old_android || ua.contains("opera mini") || ua.contains("msie ");

    Self { constrained, supported: !unsupported }
  }

  /// Raster scale relative to CSS pixels.
  pub fn capture_scale(&self) -> f32 {
    if self.constrained { 1.0 } else { 2.0 }
  }
}

/// Leading integer right after `marker`, e.g. "android 4.4" -> 4, "iphone os 9_3" -> 9.
fn major_after(ua: &str, marker: &str) -> Option<u32> {
  let start = ua.find(marker)? + marker.len();
  let digits: String = ua[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
  digits.parse().ok()
}
