//! Cache keys for Jira requests.

use sha2::{Digest, Sha256};

/// Identity of one cacheable Jira request.
///
/// Two textually identical query blocks for the same account always map to
/// the same key, so re-rendering a note reuses earlier results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheKey {
  /// A JQL search capped at `limit` results
  Search {
    account: String,
    jql: String,
    limit: u32,
  },
  /// A single issue by key
  Issue { account: String, key: String },
}

impl CacheKey {
  pub fn search(account: &str, jql: &str, limit: u32) -> Self {
    Self::Search {
      account: account.to_string(),
      jql: jql.to_string(),
      limit,
    }
  }

  pub fn issue(account: &str, key: &str) -> Self {
    Self::Issue {
      account: account.to_string(),
      key: key.to_string(),
    }
  }

  /// Stable, fixed-length hash used as the map key.
  pub fn cache_hash(&self) -> String {
    let input = match self {
      Self::Search {
        account,
        jql,
        limit,
      } => format!("search:{}:{}:{}", account, limit, jql.trim()),
      Self::Issue { account, key } => format!("issue:{}:{}", account, key.trim()),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human readable form for logs.
  pub fn description(&self) -> String {
    match self {
      Self::Search {
        account,
        jql,
        limit,
      } => format!("search [{}] (limit {}): {}", account, limit, jql),
      Self::Issue { account, key } => format!("issue [{}] {}", account, key),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_hash_is_stable_and_fixed_length() {
    let a = CacheKey::search("work", "project = X", 5).cache_hash();
    let b = CacheKey::search("work", "project = X", 5).cache_hash();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
  }

  #[test]
  fn test_surrounding_whitespace_is_ignored() {
    assert_eq!(
      CacheKey::search("work", "  project = X ", 5).cache_hash(),
      CacheKey::search("work", "project = X", 5).cache_hash()
    );
  }

  #[test]
  fn test_every_component_matters() {
    let base = CacheKey::search("work", "project = X", 5).cache_hash();
    assert_ne!(base, CacheKey::search("work", "project = X", 6).cache_hash());
    assert_ne!(base, CacheKey::search("home", "project = X", 5).cache_hash());
    assert_ne!(base, CacheKey::search("work", "project = Y", 5).cache_hash());
    assert_ne!(
      CacheKey::issue("work", "X-1").cache_hash(),
      CacheKey::issue("home", "X-1").cache_hash()
    );
  }

  #[test]
  fn test_description() {
    assert_eq!(
      CacheKey::issue("work", "X-1").description(),
      "issue [work] X-1"
    );
  }
}
