//! Renders query blocks, issue tags and whole notes to Markdown.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::cache::CachedValue;
use crate::cell::CellContext;
use crate::config::Config;
use crate::inline::InlineScanner;
use crate::jira::client::{JiraApi, JiraClient};
use crate::jira::service::{Caches, JiraService};
use crate::notes::{scan_notes, Note};
use crate::render::{
  render_count, render_error, render_issue_badge, render_list, render_table, Footer,
};
use crate::search::config::{COUNT_FENCE, ISSUE_FENCE, SEARCH_FENCE};
use crate::search::{ParseContext, QueryConfig, ResultFormat};

/// Fenced block kinds the renderer replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
  Search,
  Count,
  Issue,
}

impl BlockKind {
  pub fn from_fence(language: &str) -> Option<Self> {
    match language {
      SEARCH_FENCE => Some(Self::Search),
      COUNT_FENCE => Some(Self::Count),
      ISSUE_FENCE => Some(Self::Issue),
      _ => None,
    }
  }
}

/// Main application state
pub struct App<A> {
  config: Config,
  service: JiraService<A>,
  notes: Vec<Note>,
  /// Drop cached results before reading them
  refresh: bool,
}

impl App<JiraClient> {
  /// Connect to `account`, or to the default account when `None`.
  pub async fn new(
    config: Config,
    account: Option<&str>,
    notes_root: Option<&Path>,
    refresh: bool,
  ) -> Result<Self> {
    let account_config = match account {
      Some(alias) => config
        .account(alias)
        .ok_or_else(|| eyre!("No Jira account with alias {}", alias))?,
      None => config
        .default_account()
        .ok_or_else(|| eyre!("No Jira account configured"))?,
    };

    let client = JiraClient::new(account_config)?;
    let ttl = chrono::Duration::from_std(config.cache_ttl()?)?;
    let service = JiraService::new(client, account_config.to_account(), Caches::new(ttl));

    if let Err(e) = service.load_fields().await {
      warn!(error = %e, "custom field names are unavailable");
    }

    let notes = match notes_root.map(scan_notes) {
      Some(Ok(notes)) => notes,
      Some(Err(e)) => {
        warn!(error = %e, "notes are unavailable");
        Vec::new()
      }
      None => Vec::new(),
    };

    Ok(Self::with_service(config, service, notes, refresh))
  }
}

impl<A: JiraApi> App<A> {
  pub fn with_service(
    config: Config,
    service: JiraService<A>,
    notes: Vec<Note>,
    refresh: bool,
  ) -> Self {
    Self {
      config,
      service,
      notes,
      refresh,
    }
  }

  fn parse_context(&self) -> ParseContext<'_> {
    ParseContext {
      account: self.service.account(),
      default_limit: self.config.search_results_limit,
    }
  }

  fn cell_context(&self) -> CellContext<'_> {
    CellContext {
      account: self.service.account(),
      date_format: &self.config.date_format,
      notes: &self.notes,
      note_folder: &self.config.note_folder,
    }
  }

  pub async fn render_block(&self, kind: BlockKind, source: &str) -> String {
    match kind {
      BlockKind::Search => self.render_search(source).await,
      BlockKind::Count => self.render_count(source).await,
      BlockKind::Issue => self.render_issues(source).await,
    }
  }

  /// A `jira-search` block as a table or list.
  pub async fn render_search(&self, source: &str) -> String {
    let config = match QueryConfig::parse(source, &self.parse_context()) {
      Ok(config) => config,
      Err(e) => return render_error(&e.to_string()),
    };
    if self.refresh {
      self.service.refresh_search(&config);
    }

    let fetched = self.service.search(&config).await;
    let results = match fetched.entry.value {
      CachedValue::Data(results) => results,
      CachedValue::Error(message) => return render_error(&message),
    };

    let account = self.service.account();
    let footer = Footer::new(
      &config,
      account,
      results.total,
      self.service.search_last_updated(&config),
    );

    match config.format {
      ResultFormat::List => render_list(&results, account, &footer),
      ResultFormat::Table => {
        let defaults = match self.config.default_columns(account.fields()) {
          Ok(columns) => columns,
          Err(e) => return render_error(&e.to_string()),
        };
        let columns = config.effective_columns(&defaults);
        render_table(&results, columns, &self.cell_context(), &footer)
      }
    }
  }

  /// A `jira-count` block.
  pub async fn render_count(&self, source: &str) -> String {
    let config = match QueryConfig::parse(source, &self.parse_context()) {
      Ok(config) => config,
      Err(e) => return render_error(&e.to_string()),
    };
    if self.refresh {
      self.service.refresh_search(&config);
    }

    match self.service.search(&config).await.entry.value {
      CachedValue::Data(results) => render_count(&config, results.total),
      CachedValue::Error(message) => render_error(&message),
    }
  }

  /// A `jira-issue` block: one issue key per line.
  pub async fn render_issues(&self, source: &str) -> String {
    let keys = source
      .lines()
      .map(str::trim)
      .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let mut lines = Vec::new();
    for key in keys {
      lines.push(self.render_issue(key, false).await);
    }
    lines.join("\n")
  }

  async fn render_issue(&self, key: &str, compact: bool) -> String {
    if self.refresh {
      self.service.refresh_issue(key);
    }
    match self.service.issue(key).await.entry.value {
      CachedValue::Data(issue) => render_issue_badge(&issue, compact, self.service.account()),
      CachedValue::Error(message) => render_error(&message),
    }
  }

  fn scanner(&self) -> Option<InlineScanner> {
    InlineScanner::new(
      &self.config.inline_issue_prefix,
      self.config.inline_issue_url_to_tag,
      &[self.service.account()],
    )
    .map_err(|e| warn!(error = %e, "inline tags disabled"))
    .ok()
  }

  /// Text with every inline tag replaced by an issue badge.
  pub async fn render_inline(&self, text: &str) -> String {
    let Some(scanner) = self.scanner() else {
      return text.to_string();
    };

    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for tag in scanner.scan(text) {
      output.push_str(&text[cursor..tag.span.start]);
      let badge = match self.service.issue(&tag.key).await.entry.value {
        CachedValue::Data(issue) => render_issue_badge(&issue, tag.compact, self.service.account()),
        CachedValue::Error(message) => format!("`{}: {}`", tag.key, message),
      };
      output.push_str(&badge);
      cursor = tag.span.end;
    }
    output.push_str(&text[cursor..]);
    output
  }

  /// Text with issue URLs turned into inline tags.
  pub fn rewrite_urls(&self, text: &str) -> String {
    match self.scanner() {
      Some(scanner) => scanner.rewrite_urls(text),
      None => text.to_string(),
    }
  }

  /// A whole Markdown note: query fences are rendered, inline tags outside
  /// of code fences become badges.
  pub async fn render_note(&self, text: &str) -> String {
    let mut output = String::new();
    let mut prose = String::new();
    let mut lines = text.split_inclusive('\n');

    while let Some(line) = lines.next() {
      let Some(language) = line.trim().strip_prefix("```") else {
        prose.push_str(line);
        continue;
      };

      output.push_str(&self.render_inline(&prose).await);
      prose.clear();

      let mut body = String::new();
      let mut closing = None;
      for inner in lines.by_ref() {
        if inner.trim() == "```" {
          closing = Some(inner);
          break;
        }
        body.push_str(inner);
      }

      match BlockKind::from_fence(language.trim()) {
        Some(kind) => {
          info!(fence = language.trim(), "rendering block");
          output.push_str(&self.render_block(kind, &body).await);
          output.push('\n');
        }
        None => {
          output.push_str(line);
          output.push_str(&body);
          output.push_str(closing.unwrap_or_default());
        }
      }
    }

    output.push_str(&self.render_inline(&prose).await);
    output
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::account::Account;
  use crate::jira::service::tests::FakeJira;
  use std::sync::atomic::Ordering;

  fn app_with(api: FakeJira, caches: Caches, refresh: bool) -> App<FakeJira> {
    let config = Config::from_yaml("note_folder: jira").unwrap();
    let account = Account::new("work", "https://jira.example.com");
    let service = JiraService::new(api, account, caches);
    App::with_service(config, service, Vec::new(), refresh)
  }

  fn app(api: FakeJira) -> App<FakeJira> {
    app_with(api, Caches::new(chrono::Duration::minutes(15)), false)
  }

  #[tokio::test]
  async fn test_second_render_is_served_from_cache() {
    let api = FakeJira::default();
    let app = app(api.clone());
    let block = "query: project = X\nlimit: 5";

    let first = app.render_search(block).await;
    let second = app.render_search(block).await;

    assert_eq!(api.searches.load(Ordering::SeqCst), 1);
    assert!(first
      .contains("| Key | Summary | T | Created | Updated | Reporter | Assignee | P | Status |"));
    assert!(first.contains("[Total results: 3 - work]"));
    assert!(first.contains("Last update: "));
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn test_refresh_fetches_again() {
    let api = FakeJira::default();
    let caches = Caches::new(chrono::Duration::minutes(15));
    let cached = app_with(api.clone(), caches.clone(), false);
    let refreshing = app_with(api.clone(), caches, true);

    cached.render_count("project = X").await;
    cached.render_count("project = X").await;
    assert_eq!(api.searches.load(Ordering::SeqCst), 1);

    assert_eq!(refreshing.render_count("project = X").await, "Count: 3");
    assert_eq!(api.searches.load(Ordering::SeqCst), 2);
    refreshing.render_search("project = X").await;
    assert_eq!(api.searches.load(Ordering::SeqCst), 3);

    cached.render_issues("X-8").await;
    refreshing.render_issues("X-8").await;
    assert_eq!(api.issues.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_parse_errors_render_without_fetching() {
    let api = FakeJira::default();
    let app = app(api.clone());

    let output = app.render_search("type: list\ncolumns: KEY\nquery: x").await;
    assert_eq!(
      output,
      "> **Search error**: Type LIST and custom columns are not compatible options"
    );
    assert_eq!(api.searches.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_fetch_errors_render_as_error_blocks() {
    let api = FakeJira {
      fail: true,
      ..FakeJira::default()
    };
    let app = app(api.clone());

    let output = app.render_count("project = X").await;
    assert_eq!(output, "> **Search error**: Failed to search issues: 400 Bad Request");
    app.render_count("project = X").await;
    assert_eq!(api.searches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_count_and_list() {
    let app = app(FakeJira::default());
    assert_eq!(app.render_count("query: project = X\nlabel: Open").await, "Open: 3");

    let list = app.render_search("type: list\nquery: project = X").await;
    assert!(list.starts_with("- [X-1](https://jira.example.com/browse/X-1) Issue 1\n"));
  }

  #[tokio::test]
  async fn test_inline_tags() {
    let app = app(FakeJira::default());
    let output = app.render_inline("Blocked by JIRA:-X-9, see JIRA:X-8.").await;
    assert_eq!(
      output,
      "Blocked by [X-9](https://jira.example.com/browse/X-9), \
       see [X-8](https://jira.example.com/browse/X-8) Fix login."
    );
    assert_eq!(
      app.rewrite_urls("https://jira.example.com/browse/X-3"),
      "JIRA:X-3"
    );
  }

  #[tokio::test]
  async fn test_render_note() {
    let app = app(FakeJira::default());
    let note = "# Sprint\n\n```jira-count\nproject = X\n```\n\n\
                ```rust\nlet tag = \"JIRA:X-1\";\n```\nJIRA:-X-2\n";
    let output = app.render_note(note).await;

    assert_eq!(
      output,
      "# Sprint\n\nCount: 3\n\n```rust\nlet tag = \"JIRA:X-1\";\n```\n\
       [X-2](https://jira.example.com/browse/X-2)\n"
    );
  }
}
