//! In-memory TTL cache of generated study sheets.
//!
//! Best-effort only: losing an entry costs a regeneration, never correctness.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{Amount, GenerationRequest, GradeLevel, StudySheetContent};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyMaterial<'a> {
  topic: &'a str,
  grade_level: GradeLevel,
  content_amount: Amount,
  exercise_amount: Amount,
  model: &'a str,
}

impl CacheKey {
  /// Hash of a stable serialization of the request fields plus the resolved model.
  pub fn for_request(req: &GenerationRequest, model: &str) -> Self {
    let material = KeyMaterial {
      topic: req.topic.trim(),
      grade_level: req.grade_level,
      content_amount: req.content_amount,
      exercise_amount: req.exercise_amount,
      model,
    };
    // Struct field order is fixed, so this serialization is stable.
    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    CacheKey(URL_SAFE_NO_PAD.encode(digest))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
  pub value: StudySheetContent,
  pub inserted_at: Instant,
}

#[derive(Debug)]
pub struct ResponseCache {
  ttl: Duration,
  max_entries: usize,
  entries: HashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
  pub fn new(ttl: Duration, max_entries: usize) -> Self {
    Self { ttl, max_entries: max_entries.max(1), entries: HashMap::new() }
  }

  pub fn get(&mut self, key: &CacheKey) -> Option<StudySheetContent> {
    self.get_at(key, Instant::now())
  }

  pub fn set(&mut self, key: CacheKey, value: StudySheetContent) {
    self.set_at(key, value, Instant::now())
  }

  /// Expired entries count as a miss and are evicted on the spot.
  pub fn get_at(&mut self, key: &CacheKey, now: Instant) -> Option<StudySheetContent> {
    let fresh = match self.entries.get(key) {
      Some(entry) => now.saturating_duration_since(entry.inserted_at) < self.ttl,
      None => return None,
    };
    if fresh {
      self.entries.get(key).map(|e| e.value.clone())
    } else {
      self.entries.remove(key);
      None
    }
  }

  /// Overwrites unconditionally. When full, the oldest entry makes room.
  pub fn set_at(&mut self, key: CacheKey, value: StudySheetContent, now: Instant) {
    if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
      self.purge_expired_at(now);
      if self.entries.len() >= self.max_entries {
        let oldest = self
          .entries
          .iter()
          .min_by_key(|(_, e)| e.inserted_at)
          .map(|(k, _)| k.clone());
        if let Some(k) = oldest {
          self.entries.remove(&k);
        }
      }
    }
    self.entries.insert(key, CacheEntry { value, inserted_at: now });
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }

  /// Drop every expired entry; returns how many were removed.
  pub fn purge_expired_at(&mut self, now: Instant) -> usize {
    let before = self.entries.len();
    let ttl = self.ttl;
    self.entries.retain(|_, e| now.saturating_duration_since(e.inserted_at) < ttl);
    before - self.entries.len()
  }

  pub fn purge_expired(&mut self) -> usize {
    self.purge_expired_at(Instant::now())
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fallback::generate_emergency_content;

  fn req(topic: &str) -> GenerationRequest {
    GenerationRequest::new(topic, GradeLevel::M1, Amount::Medium, Amount::Medium)
  }

  #[test]
  fn key_is_stable_and_sensitive_to_every_field() {
    let base = CacheKey::for_request(&req("พีชคณิต"), "m");
    assert_eq!(base, CacheKey::for_request(&req("พีชคณิต"), "m"));
    assert_eq!(base, CacheKey::for_request(&req("  พีชคณิต "), "m"));
    assert_ne!(base, CacheKey::for_request(&req("เรขาคณิต"), "m"));
    assert_ne!(base, CacheKey::for_request(&req("พีชคณิต"), "other"));

    let mut r = req("พีชคณิต");
    r.exercise_amount = Amount::High;
    assert_ne!(base, CacheKey::for_request(&r, "m"));
  }

  #[test]
  fn round_trip_then_expiry() {
    let mut cache = ResponseCache::new(Duration::from_secs(60), 10);
    let key = CacheKey::for_request(&req("พีชคณิต"), "m");
    let value = generate_emergency_content("พีชคณิต");
    let t0 = Instant::now();

    cache.set_at(key.clone(), value.clone(), t0);
    assert_eq!(cache.get_at(&key, t0), Some(value));
    assert!(cache.get_at(&key, t0 + Duration::from_secs(59)).is_some());
    assert!(cache.get_at(&key, t0 + Duration::from_secs(60)).is_none());
    assert!(cache.is_empty());
  }

  #[test]
  fn full_cache_evicts_oldest() {
    let mut cache = ResponseCache::new(Duration::from_secs(600), 2);
    let t0 = Instant::now();
    let a = CacheKey::for_request(&req("a"), "m");
    let b = CacheKey::for_request(&req("b"), "m");
    let c = CacheKey::for_request(&req("c"), "m");
    cache.set_at(a.clone(), generate_emergency_content("a"), t0);
    cache.set_at(b.clone(), generate_emergency_content("b"), t0 + Duration::from_secs(1));
    cache.set_at(c.clone(), generate_emergency_content("c"), t0 + Duration::from_secs(2));

    let now = t0 + Duration::from_secs(3);
    assert_eq!(cache.len(), 2);
    assert!(cache.get_at(&a, now).is_none());
    assert!(cache.get_at(&b, now).is_some());
    assert!(cache.get_at(&c, now).is_some());
  }

  #[test]
  fn purge_and_clear() {
    let mut cache = ResponseCache::new(Duration::from_secs(10), 10);
    let t0 = Instant::now();
    cache.set_at(CacheKey::for_request(&req("old"), "m"), generate_emergency_content("old"), t0);
    cache.set_at(
      CacheKey::for_request(&req("new"), "m"),
      generate_emergency_content("new"),
      t0 + Duration::from_secs(8),
    );
    assert_eq!(cache.purge_expired_at(t0 + Duration::from_secs(12)), 1);
    assert_eq!(cache.len(), 1);
    cache.clear();
    assert!(cache.is_empty());
  }
}
