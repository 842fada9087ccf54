//! Values held by the result cache.

use chrono::{DateTime, Utc};

/// Either a fetched payload or the message of the error that replaced it.
///
/// Failures are cached like successes so a broken query is not re-sent on
/// every render.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue<T> {
  Data(T),
  Error(String),
}

impl<T> CachedValue<T> {
  pub fn is_error(&self) -> bool {
    matches!(self, CachedValue::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      CachedValue::Data(data) => Some(data),
      CachedValue::Error(_) => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      CachedValue::Error(e) => Some(e),
      CachedValue::Data(_) => None,
    }
  }

  /// Convert a fetch outcome, keeping only the error's message.
  pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
    match result {
      Ok(data) => CachedValue::Data(data),
      Err(e) => CachedValue::Error(e.to_string()),
    }
  }
}

/// A cached value and the moment it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
  pub value: CachedValue<T>,
  pub stored_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  pub fn is_error(&self) -> bool {
    self.value.is_error()
  }

  pub fn data(&self) -> Option<&T> {
    self.value.data()
  }

  pub fn error(&self) -> Option<&str> {
    self.value.error()
  }
}

/// Where a coordinator result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Served from a live cache entry
  Cache,
  /// This call performed the fetch
  Network,
  /// Another caller's fetch for the same key was already running
  Joined,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_from_result_keeps_message() {
    let ok: CachedValue<u32> = CachedValue::from_result(Ok::<_, String>(3));
    assert_eq!(ok.data(), Some(&3));
    assert!(!ok.is_error());

    let err: CachedValue<u32> = CachedValue::from_result(Err("boom"));
    assert!(err.is_error());
    assert_eq!(err.error(), Some("boom"));
    assert_eq!(err.data(), None);
  }
}
