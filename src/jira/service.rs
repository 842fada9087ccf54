//! Cached access to one Jira account.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::sync::Arc;
use tracing::info;

use crate::cache::{CacheKey, Clock, FetchCoordinator, Fetched};
use crate::search::QueryConfig;

use super::account::{Account, FieldCatalog};
use super::client::JiraApi;
use super::types::{Issue, SearchResults};

/// Process-wide result caches, shared by every account and renderer.
#[derive(Clone)]
pub struct Caches {
  pub issues: FetchCoordinator<Arc<Issue>>,
  pub searches: FetchCoordinator<Arc<SearchResults>>,
}

impl Caches {
  pub fn new(ttl: chrono::Duration) -> Self {
    Self {
      issues: FetchCoordinator::new(ttl),
      searches: FetchCoordinator::new(ttl),
    }
  }

  pub fn with_clock(ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
    Self {
      issues: FetchCoordinator::with_clock(ttl, Arc::clone(&clock)),
      searches: FetchCoordinator::with_clock(ttl, clock),
    }
  }

  /// Forget everything.
  pub fn clear(&self) {
    self.issues.clear();
    self.searches.clear();
  }
}

/// Fetches issues and searches of one account through the shared caches.
///
/// Results are normalized before they are cached, so every reader sees the
/// same complete record.
pub struct JiraService<A> {
  api: A,
  account: Arc<Account>,
  caches: Caches,
}

impl<A: JiraApi> JiraService<A> {
  pub fn new(api: A, account: Account, caches: Caches) -> Self {
    Self {
      api,
      account: Arc::new(account),
      caches,
    }
  }

  pub fn account(&self) -> &Account {
    &self.account
  }

  /// Fill the account's custom field catalog on first use.
  pub async fn load_fields(&self) -> Result<&FieldCatalog> {
    let api = self.api.clone();
    let alias = self.account.alias.clone();
    self
      .account
      .load_fields(|| async move {
        let fields = api.fields().await?;
        let catalog = FieldCatalog::from_fields(fields);
        info!(account = %alias, "loaded custom field catalog");
        Ok::<_, color_eyre::Report>(catalog)
      })
      .await
  }

  pub async fn search(&self, config: &QueryConfig) -> Fetched<Arc<SearchResults>> {
    let api = self.api.clone();
    let jql = config.query.clone();
    let limit = config.limit;
    self
      .caches
      .searches
      .fetch(&config.cache_key(), move || async move {
        let raw = api.search(&jql, limit).await?;
        Ok::<_, color_eyre::Report>(Arc::new(SearchResults::from(raw)))
      })
      .await
  }

  pub async fn issue(&self, key: &str) -> Fetched<Arc<Issue>> {
    let api = self.api.clone();
    let issue_key = key.to_string();
    self
      .caches
      .issues
      .fetch(&self.issue_key(key), move || async move {
        let raw = api.issue(&issue_key).await?;
        Ok::<_, color_eyre::Report>(Arc::new(Issue::from(raw)))
      })
      .await
  }

  /// Drop the cached search so the next read fetches again.
  pub fn refresh_search(&self, config: &QueryConfig) {
    self.caches.searches.invalidate(&config.cache_key());
  }

  pub fn refresh_issue(&self, key: &str) {
    self.caches.issues.invalidate(&self.issue_key(key));
  }

  pub fn search_last_updated(&self, config: &QueryConfig) -> Option<DateTime<Utc>> {
    self.caches.searches.last_updated(&config.cache_key())
  }

  pub fn issue_last_updated(&self, key: &str) -> Option<DateTime<Utc>> {
    self.caches.issues.last_updated(&self.issue_key(key))
  }

  fn issue_key(&self, key: &str) -> CacheKey {
    CacheKey::issue(&self.account.alias, key)
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::{CacheSource, ManualClock};
  use crate::jira::api_types::{ApiField, RawIssue, RawSearchResults};
  use crate::search::ParseContext;
  use color_eyre::eyre::eyre;
  use serde_json::{json, Value};
  use std::sync::atomic::{AtomicUsize, Ordering};

  /// Serves canned responses and counts the calls it receives.
  #[derive(Clone, Default)]
  pub(crate) struct FakeJira {
    pub searches: Arc<AtomicUsize>,
    pub issues: Arc<AtomicUsize>,
    pub fail: bool,
  }

  impl JiraApi for FakeJira {
    async fn search(&self, _jql: &str, limit: u32) -> Result<RawSearchResults> {
      self.searches.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(eyre!("Failed to search issues: 400 Bad Request"));
      }
      let issues: Vec<Value> = (1..=3)
        .take(limit as usize)
        .map(|n| json!({ "key": format!("X-{n}"), "fields": { "summary": format!("Issue {n}") } }))
        .collect();
      Ok(serde_json::from_value(json!({ "issues": issues, "total": 3 }))?)
    }

    async fn issue(&self, key: &str) -> Result<RawIssue> {
      self.issues.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(eyre!("Failed to get issue {}: 404 Not Found", key));
      }
      Ok(serde_json::from_value(json!({ "key": key, "fields": { "summary": "Fix login" } }))?)
    }

    async fn fields(&self) -> Result<Vec<ApiField>> {
      Ok(serde_json::from_value(json!([
        { "id": "customfield_10010", "name": "Story Points", "custom": true,
          "schema": { "type": "number", "customId": 10010 } }
      ]))?)
    }
  }

  fn service(api: FakeJira, clock: Arc<ManualClock>) -> JiraService<FakeJira> {
    let caches = Caches::with_clock(chrono::Duration::minutes(15), clock);
    JiraService::new(api, Account::new("work", "https://jira.example.com"), caches)
  }

  #[tokio::test]
  async fn test_search_is_cached() {
    let api = FakeJira::default();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = service(api.clone(), clock);
    let ctx = ParseContext {
      account: service.account(),
      default_limit: 10,
    };
    let config = QueryConfig::parse("query: project = X\nlimit: 5", &ctx).unwrap();

    let first = service.search(&config).await;
    assert_eq!(first.source, CacheSource::Network);
    let results = first.entry.data().unwrap();
    assert_eq!(results.issues.len(), 3);
    assert_eq!(results.total, 3);

    let cached = service.caches.searches.get(&config.cache_key()).unwrap();
    assert_eq!(cached.data().unwrap().total, 3);

    let second = service.search(&config).await;
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(api.searches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fetch_errors_are_cached_until_refresh() {
    let api = FakeJira {
      fail: true,
      ..FakeJira::default()
    };
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = service(api.clone(), clock);

    let first = service.issue("X-1").await;
    assert_eq!(first.entry.error(), Some("Failed to get issue X-1: 404 Not Found"));

    let second = service.issue("X-1").await;
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(api.issues.load(Ordering::SeqCst), 1);

    service.refresh_issue("X-1");
    service.issue("X-1").await;
    assert_eq!(api.issues.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_issues_are_normalized_before_caching() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = service(FakeJira::default(), clock);

    let fetched = service.issue("X-7").await;
    let issue = fetched.entry.data().unwrap();
    assert_eq!(issue.key, "X-7");
    assert_eq!(issue.fields.summary, "Fix login");
    assert_eq!(issue.fields.assignee.avatar_urls.x16, "");
    assert!(service.issue_last_updated("X-7").is_some());
  }

  #[tokio::test]
  async fn test_fields_load_once() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = service(FakeJira::default(), clock);

    let fields = service.load_fields().await.unwrap();
    assert_eq!(fields.custom_field_id("story points").as_deref(), Some("10010"));
    assert!(service.account().fields().has_custom_field_name("Story Points"));
  }
}
