use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use tracing::debug;

use crate::config::{AccountConfig, AuthType, Config};

use super::api_types::{ApiField, RawIssue, RawSearchResults};

/// The Jira endpoints the renderers depend on.
///
/// Any failure is reported as an error whose message ends up, verbatim, in
/// the cache and in front of the user.
pub trait JiraApi: Clone + Send + Sync + 'static {
  /// Run a JQL search returning at most `limit` issues.
  fn search(&self, jql: &str, limit: u32) -> impl Future<Output = Result<RawSearchResults>> + Send;

  fn issue(&self, key: &str) -> impl Future<Output = Result<RawIssue>> + Send;

  /// Every field definition of the instance.
  fn fields(&self) -> impl Future<Output = Result<Vec<ApiField>>> + Send;
}

/// Jira API client wrapper
#[derive(Clone)]
pub struct JiraClient {
  client: gouqi::r#async::Jira,
}

impl JiraClient {
  pub fn new(account: &AccountConfig) -> Result<Self> {
    let credentials = match account.effective_auth_type() {
      AuthType::Open => gouqi::Credentials::Anonymous,
      AuthType::Cloud => gouqi::Credentials::Basic(account.email.clone(), Config::get_api_token()?),
      AuthType::Onpremise | AuthType::Auto => gouqi::Credentials::Bearer(Config::get_api_token()?),
    };

    let client = gouqi::r#async::Jira::new(&account.host, credentials)
      .map_err(|e| eyre!("Failed to create Jira client for {}: {}", account.alias, e))?;

    Ok(Self { client })
  }
}

impl JiraApi for JiraClient {
  async fn search(&self, jql: &str, limit: u32) -> Result<RawSearchResults> {
    let encoded: String = url::form_urlencoded::byte_serialize(jql.as_bytes()).collect();
    let endpoint = format!("/search?jql={}&maxResults={}", encoded, limit);
    debug!(%jql, limit, "searching issues");

    self
      .client
      .get("api", &endpoint)
      .await
      .map_err(|e| eyre!("Failed to search issues: {}", e))
  }

  async fn issue(&self, key: &str) -> Result<RawIssue> {
    let endpoint = format!("/issue/{}", key);
    debug!(key, "fetching issue");

    self
      .client
      .get("api", &endpoint)
      .await
      .map_err(|e| eyre!("Failed to get issue {}: {}", key, e))
  }

  async fn fields(&self) -> Result<Vec<ApiField>> {
    debug!("fetching field definitions");

    self
      .client
      .get("api", "/field")
      .await
      .map_err(|e| eyre!("Failed to get fields: {}", e))
  }
}
