use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::duration::parse_ttl;
use crate::error::{DurationError, QueryError};
use crate::jira::account::{Account, FieldCatalog, StatusColor};
use crate::search::ColumnSpec;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub accounts: Vec<AccountConfig>,
  /// How long a fetched result stays fresh, e.g. `15m`
  #[serde(default = "default_cache_time")]
  pub cache_time: String,
  #[serde(default = "default_search_results_limit")]
  pub search_results_limit: u32,
  /// Columns of a table block that doesn't list its own
  #[serde(default = "default_search_columns")]
  pub search_columns: Vec<String>,
  #[serde(default = "default_inline_issue_prefix")]
  pub inline_issue_prefix: String,
  /// Rewrite issue URLs of known accounts into inline tags
  #[serde(default = "default_true")]
  pub inline_issue_url_to_tag: bool,
  /// Folder where new issue notes are created
  #[serde(default)]
  pub note_folder: String,
  /// chrono format string for date cells
  #[serde(default = "default_date_format")]
  pub date_format: String,
}

fn default_cache_time() -> String {
  "15m".to_string()
}

fn default_search_results_limit() -> u32 {
  10
}

fn default_search_columns() -> Vec<String> {
  [
    "KEY", "SUMMARY", "-TYPE", "CREATED", "UPDATED", "REPORTER", "ASSIGNEE", "-PRIORITY", "STATUS",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

fn default_inline_issue_prefix() -> String {
  "JIRA:".to_string()
}

fn default_true() -> bool {
  true
}

fn default_date_format() -> String {
  "%Y-%m-%d".to_string()
}

fn default_priority() -> u32 {
  1
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
  /// Auto-detect based on URL: .atlassian.net = cloud, else on-premise
  #[default]
  Auto,
  /// Jira Cloud - uses Basic auth (email + API token as password)
  Cloud,
  /// Jira On-premise - uses Bearer auth (PAT)
  Onpremise,
  /// No authentication
  Open,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
  pub alias: String,
  pub host: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub color: String,
  #[serde(default)]
  pub auth_type: AuthType,
  /// Lower is preferred; the lowest one is the default account
  #[serde(default = "default_priority")]
  pub priority: u32,
  /// Status name to color overrides
  #[serde(default)]
  pub status_colors: BTreeMap<String, StatusColor>,
}

impl AccountConfig {
  /// Auth type with `Auto` resolved from the host.
  pub fn effective_auth_type(&self) -> AuthType {
    match self.auth_type {
      AuthType::Auto if self.host.contains(".atlassian.net") => AuthType::Cloud,
      AuthType::Auto => AuthType::Onpremise,
      other => other,
    }
  }

  pub fn to_account(&self) -> Account {
    Account::new(&self.alias, &self.host)
      .with_color(&self.color)
      .with_priority(self.priority)
      .with_status_colors(self.status_colors.clone())
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jira-notes.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jira-notes/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/jira-notes/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jira-notes.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jira-notes").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    config.cache_ttl()?;
    Ok(config)
  }

  pub fn cache_ttl(&self) -> Result<Duration, DurationError> {
    parse_ttl(&self.cache_time)
  }

  /// The preferred account: lowest priority, first listed on ties.
  pub fn default_account(&self) -> Option<&AccountConfig> {
    self
      .accounts
      .iter()
      .enumerate()
      .min_by_key(|(index, account)| (account.priority, *index))
      .map(|(_, account)| account)
  }

  pub fn account(&self, alias: &str) -> Option<&AccountConfig> {
    self
      .accounts
      .iter()
      .find(|account| account.alias.eq_ignore_ascii_case(alias))
  }

  /// Parsed `search_columns`.
  pub fn default_columns(&self, fields: &FieldCatalog) -> Result<Vec<ColumnSpec>, QueryError> {
    self
      .search_columns
      .iter()
      .map(|token| ColumnSpec::parse(token, fields))
      .collect()
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JIRA_NOTES_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JIRA_NOTES_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!(
          "Jira API token not found. Set JIRA_NOTES_TOKEN or JIRA_API_TOKEN environment variable."
        )
      })
  }
}
