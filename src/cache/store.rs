//! In-memory result cache with lazy TTL expiry.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, CachedValue};

/// Process-wide mapping from cache key to the last fetch outcome.
///
/// Entries expire lazily: a lookup whose entry is at least `ttl` old is a
/// miss, but the entry stays in place (so [`ResultCache::last_updated`] can
/// still report it) until it is overwritten, deleted or cleared.
pub struct ResultCache<T> {
  entries: Mutex<HashMap<String, CacheEntry<T>>>,
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl<T: Clone> ResultCache<T> {
  pub fn new(ttl: Duration) -> Self {
    Self::with_clock(ttl, Arc::new(SystemClock))
  }

  pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      ttl,
      clock,
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn is_live(&self, entry: &CacheEntry<T>) -> bool {
    self.clock.now() - entry.stored_at < self.ttl
  }

  /// Look up a live entry. Expired entries read as absent.
  pub fn get(&self, key: &str) -> Option<CacheEntry<T>> {
    let entries = self.entries();
    let entry = entries.get(key)?;
    if self.is_live(entry) {
      Some(entry.clone())
    } else {
      debug!(key, stored_at = %entry.stored_at, "cache entry expired");
      None
    }
  }

  /// Store a successful payload.
  pub fn put(&self, key: &str, value: T) -> CacheEntry<T> {
    self.store(key, CachedValue::Data(value))
  }

  /// Store a fetch failure.
  pub fn put_error(&self, key: &str, message: impl Into<String>) -> CacheEntry<T> {
    self.store(key, CachedValue::Error(message.into()))
  }

  /// Overwrite the entry for `key` and return what was stored.
  pub fn store(&self, key: &str, value: CachedValue<T>) -> CacheEntry<T> {
    let entry = self.stamp(value);
    self.entries().insert(key.to_string(), entry.clone());
    entry
  }

  /// Timestamp a value without storing it.
  pub(super) fn stamp(&self, value: CachedValue<T>) -> CacheEntry<T> {
    CacheEntry {
      value,
      stored_at: self.clock.now(),
    }
  }

  pub fn delete(&self, key: &str) {
    self.entries().remove(key);
  }

  pub fn clear(&self) {
    self.entries().clear();
  }

  /// When `key` was last written, whether or not the entry is still live.
  pub fn last_updated(&self, key: &str) -> Option<DateTime<Utc>> {
    self.entries().get(key).map(|entry| entry.stored_at)
  }

  pub fn len(&self) -> usize {
    self.entries().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::clock::ManualClock;

  fn cache_with_clock(ttl: Duration) -> (ResultCache<&'static str>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache = ResultCache::with_clock(ttl, clock.clone());
    (cache, clock)
  }

  #[test]
  fn test_hit_just_before_ttl_miss_just_after() {
    let (cache, clock) = cache_with_clock(Duration::minutes(15));
    cache.put("k", "v");

    clock.advance(Duration::minutes(15) - Duration::milliseconds(1));
    let hit = cache.get("k").expect("hit before ttl");
    assert_eq!(hit.data(), Some(&"v"));

    clock.advance(Duration::milliseconds(2));
    assert!(cache.get("k").is_none());
  }

  #[test]
  fn test_exactly_ttl_is_a_miss() {
    let (cache, clock) = cache_with_clock(Duration::seconds(10));
    cache.put("k", "v");
    clock.advance(Duration::seconds(10));
    assert!(cache.get("k").is_none());
  }

  #[test]
  fn test_error_is_memoized_until_delete() {
    let (cache, clock) = cache_with_clock(Duration::minutes(1));
    cache.put_error("k", "boom");

    clock.advance(Duration::seconds(30));
    let entry = cache.get("k").expect("error entry is a hit");
    assert!(entry.is_error());
    assert_eq!(entry.error(), Some("boom"));

    cache.delete("k");
    assert!(cache.get("k").is_none());
    cache.delete("k");
  }

  #[test]
  fn test_put_overwrites_and_resets_timestamp() {
    let (cache, clock) = cache_with_clock(Duration::seconds(10));
    let first = cache.put("k", "old");
    clock.advance(Duration::seconds(8));
    let second = cache.put("k", "new");

    assert!(second.stored_at > first.stored_at);
    clock.advance(Duration::seconds(8));
    assert_eq!(cache.get("k").and_then(|e| e.data().copied()), Some("new"));
  }

  #[test]
  fn test_last_updated_survives_expiry() {
    let (cache, clock) = cache_with_clock(Duration::seconds(1));
    let entry = cache.put("k", "v");
    clock.advance(Duration::hours(1));

    assert!(cache.get("k").is_none());
    assert_eq!(cache.last_updated("k"), Some(entry.stored_at));
    assert_eq!(cache.last_updated("missing"), None);
  }

  #[test]
  fn test_clear_forgets_everything() {
    let (cache, _clock) = cache_with_clock(Duration::minutes(1));
    cache.put("a", "1");
    cache.put_error("b", "2");
    assert_eq!(cache.len(), 2);

    cache.clear();
    assert!(cache.is_empty());
    assert!(cache.get("a").is_none());
    assert_eq!(cache.last_updated("b"), None);
  }
}
