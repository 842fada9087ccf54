//! Markdown output for search tables, lists, counts, issue badges and
//! errors.

use chrono::{DateTime, Local, Utc};
use tracing::warn;

use crate::cell::{resolve_cell, CellAux, CellContext, CellDescriptor, CellItem, CellKind};
use crate::jira::account::Account;
use crate::jira::types::{Issue, SearchResults};
use crate::search::{ColumnSpec, QueryConfig};

/// Line under a search table.
#[derive(Debug, Clone)]
pub struct Footer {
  pub total: u64,
  pub alias: String,
  pub search_url: String,
  /// When the rendered result was fetched, even if it has expired since
  pub last_updated: Option<DateTime<Utc>>,
}

impl Footer {
  pub fn new(
    config: &QueryConfig,
    account: &Account,
    total: u64,
    last_updated: Option<DateTime<Utc>>,
  ) -> Self {
    Self {
      total,
      alias: account.alias.clone(),
      search_url: account.search_url(&config.query),
      last_updated,
    }
  }

  fn to_markdown(&self) -> String {
    let mut footer = format!(
      "[Total results: {} - {}]({})",
      self.total, self.alias, self.search_url
    );
    if let Some(updated) = self.last_updated {
      footer.push_str(&format!(
        "  \nLast update: {}",
        updated.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
      ));
    }
    footer
  }
}

pub fn render_table(
  results: &SearchResults,
  columns: &[ColumnSpec],
  ctx: &CellContext<'_>,
  footer: &Footer,
) -> String {
  let mut lines = Vec::with_capacity(results.issues.len() + 4);

  let headers: Vec<String> = columns.iter().map(|c| escape_cell(&c.header())).collect();
  lines.push(format!("| {} |", headers.join(" | ")));
  lines.push(format!("|{}", " --- |".repeat(columns.len())));

  for issue in &results.issues {
    let cells: Vec<String> = columns
      .iter()
      .map(|column| cell_markdown(&resolve_or_placeholder(issue, column, ctx)))
      .collect();
    lines.push(format!("| {} |", cells.join(" | ")));
  }

  lines.push(String::new());
  lines.push(footer.to_markdown());
  lines.join("\n")
}

/// Resolve a cell, degrading a failure to an empty cell.
pub fn resolve_or_placeholder(
  issue: &Issue,
  column: &ColumnSpec,
  ctx: &CellContext<'_>,
) -> CellDescriptor {
  resolve_cell(issue, column, ctx).unwrap_or_else(|e| {
    warn!(key = %issue.key, column = %column, error = %e, "failed to resolve cell");
    CellDescriptor::placeholder()
  })
}

/// One badge per line.
pub fn render_list(results: &SearchResults, account: &Account, footer: &Footer) -> String {
  let mut lines: Vec<String> = results
    .issues
    .iter()
    .map(|issue| format!("- {}", render_issue_badge(issue, false, account)))
    .collect();
  lines.push(String::new());
  lines.push(footer.to_markdown());
  lines.join("\n")
}

/// `Count: 3`; an explicit empty label leaves just the number.
pub fn render_count(config: &QueryConfig, total: u64) -> String {
  match config.label.as_deref() {
    Some("") => total.to_string(),
    Some(label) => format!("{}: {}", label, total),
    None => format!("Count: {}", total),
  }
}

/// `[KEY](url) summary `status``, or only the link when compact.
pub fn render_issue_badge(issue: &Issue, compact: bool, account: &Account) -> String {
  let link = format!("[{}]({})", issue.key, account.issue_url(&issue.key));
  if compact {
    return link;
  }
  let mut badge = link;
  if !issue.fields.summary.is_empty() {
    badge.push(' ');
    badge.push_str(&issue.fields.summary);
  }
  if !issue.fields.status.name.is_empty() {
    badge.push_str(&format!(" `{}`", issue.fields.status.name));
  }
  badge
}

pub fn render_error(message: &str) -> String {
  format!("> **Search error**: {}", message.replace('\n', " "))
}

/// Markdown for one resolved cell.
pub fn cell_markdown(cell: &CellDescriptor) -> String {
  let text = escape_cell(&cell.primary_text);
  match (&cell.kind, &cell.aux) {
    (CellKind::Link, CellAux::Url(url)) => format!("[{}]({})", text, url),
    (_, CellAux::Icon(icon)) => {
      let image = format!("![{}]({})", escape_cell(&cell.title), icon);
      if text.is_empty() {
        image
      } else {
        format!("{} {}", image, text)
      }
    }
    (_, CellAux::Avatar(avatar)) => format!("![{}]({})", escape_cell(&cell.title), avatar),
    (_, CellAux::Items(items)) => items.iter().map(item_markdown).collect::<Vec<_>>().join("<br>"),
    _ => text,
  }
}

fn item_markdown(item: &CellItem) -> String {
  let text = escape_cell(&item.text);
  let mut body = match &item.url {
    Some(url) => format!("[{}]({})", text, url.replace(' ', "%20")),
    None => text,
  };
  if item.emphasized {
    body = format!("**{}**", body);
  }
  match &item.label {
    Some(label) => format!("{}: {}", escape_cell(label), body),
    None => body,
  }
}

fn escape_cell(text: &str) -> String {
  text.replace('|', "\\|").replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cell::LINK_GLYPH;
  use crate::jira::account::FieldCatalog;
  use crate::jira::api_types::RawSearchResults;
  use crate::search::{FieldType, ParseContext};
  use serde_json::json;

  fn account() -> Account {
    Account::new("work", "https://jira.example.com").with_fields(FieldCatalog::default())
  }

  fn results() -> SearchResults {
    let raw: RawSearchResults = serde_json::from_value(json!({
      "total": 2,
      "issues": [
        { "key": "X-1", "fields": { "summary": "Fix | login", "status": { "name": "Done" } } },
        { "key": "X-2", "fields": { "summary": "Add logout" } }
      ]
    }))
    .unwrap();
    SearchResults::from(raw)
  }

  fn config(source: &str, account: &Account) -> QueryConfig {
    let ctx = ParseContext {
      account,
      default_limit: 10,
    };
    QueryConfig::parse(source, &ctx).unwrap()
  }

  #[test]
  fn test_table() {
    let account = account();
    let config = config("query: project = X", &account);
    let ctx = CellContext {
      account: &account,
      date_format: "%Y-%m-%d",
      notes: &[],
      note_folder: "",
    };
    let columns = vec![
      ColumnSpec::new(FieldType::Key),
      ColumnSpec::new(FieldType::Summary),
      ColumnSpec::new(FieldType::CustomField).with_extra("Team"),
    ];
    let footer = Footer::new(&config, &account, 2, None);

    let table = render_table(&results(), &columns, &ctx, &footer);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "| Key | Summary | Custom field |");
    assert_eq!(lines[1], "| --- | --- | --- |");
    // The unknown custom field degrades to an empty cell
    assert_eq!(
      lines[2],
      "| [X-1](https://jira.example.com/browse/X-1) | Fix \\| login |  |"
    );
    assert_eq!(
      lines[5],
      "[Total results: 2 - work](https://jira.example.com/issues/?jql=project+%3D+X)"
    );
  }

  #[test]
  fn test_footer_shows_last_update() {
    let account = account();
    let config = config("query: project = X", &account);
    let footer = Footer::new(&config, &account, 2, Some(Utc::now()));
    assert!(footer.to_markdown().contains("\nLast update: "));
  }

  #[test]
  fn test_list_and_badges() {
    let account = account();
    let config = config("type: list\nquery: project = X", &account);
    let footer = Footer::new(&config, &account, 2, None);
    let list = render_list(&results(), &account, &footer);
    let lines: Vec<&str> = list.lines().collect();
    assert_eq!(lines[0], "- [X-1](https://jira.example.com/browse/X-1) Fix | login `Done`");
    assert_eq!(lines[1], "- [X-2](https://jira.example.com/browse/X-2) Add logout");

    let issue = &results().issues[0];
    assert_eq!(
      render_issue_badge(issue, true, &account),
      "[X-1](https://jira.example.com/browse/X-1)"
    );
  }

  #[test]
  fn test_count_labels() {
    let account = account();
    assert_eq!(render_count(&config("query: a", &account), 3), "Count: 3");
    assert_eq!(render_count(&config("query: a\nlabel: Open bugs", &account), 3), "Open bugs: 3");
    assert_eq!(render_count(&config("query: a\nlabel:", &account), 3), "3");
  }

  #[test]
  fn test_composite_cells() {
    let cell = CellDescriptor::new(CellKind::CompositeList, "", "").with_aux(CellAux::Items(vec![
      CellItem {
        label: Some("Blocks".to_string()),
        text: LINK_GLYPH.to_string(),
        url: Some("https://jira.example.com/browse/X-2".to_string()),
        ..CellItem::default()
      },
      CellItem {
        text: "1.0".to_string(),
        emphasized: true,
        ..CellItem::default()
      },
    ]));
    assert_eq!(
      cell_markdown(&cell),
      "Blocks: [🔗](https://jira.example.com/browse/X-2)<br>**1.0**"
    );
  }

  #[test]
  fn test_error_block() {
    assert_eq!(render_error("Invalid key: foo"), "> **Search error**: Invalid key: foo");
  }
}
