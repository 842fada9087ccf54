//! Query blocks: the text inside a `jira-search` or `jira-count` fence.
//!
//! A block is either a single bare JQL line (basic mode) or a list of
//! `key: value` lines (advanced mode):
//!
//! ```text
//! type: table
//! query: project = PROJ AND status != Done
//! limit: 20
//! columns: key, -status, summary, $Story Points, NOTES.owner
//! label: Open work
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::fmt;
use std::str::FromStr;

use crate::cache::CacheKey;
use crate::error::QueryError;
use crate::jira::account::Account;

use super::column::ColumnSpec;

/// Fence language of search blocks.
pub const SEARCH_FENCE: &str = "jira-search";
/// Fence language of count blocks.
pub const COUNT_FENCE: &str = "jira-count";
/// Fence language of issue blocks (one key per line).
pub const ISSUE_FENCE: &str = "jira-issue";

const KEY_TYPE: &str = "type";
const KEY_QUERY: &str = "query";
const KEY_LIMIT: &str = "limit";
const KEY_COLUMNS: &str = "columns";
const KEY_LABEL: &str = "label";
const KEYS: [&str; 5] = [KEY_TYPE, KEY_QUERY, KEY_LIMIT, KEY_COLUMNS, KEY_LABEL];

/// How search results are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResultFormat {
  #[default]
  Table,
  List,
}

impl ResultFormat {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Table => "TABLE",
      Self::List => "LIST",
    }
  }
}

impl FromStr for ResultFormat {
  type Err = QueryError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "TABLE" => Ok(Self::Table),
      "LIST" => Ok(Self::List),
      _ => Err(QueryError::InvalidType(s.to_string())),
    }
  }
}

impl fmt::Display for ResultFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Settings a block falls back to for anything it doesn't specify.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
  pub account: &'a Account,
  pub default_limit: u32,
}

/// One parsed query block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
  pub format: ResultFormat,
  pub query: String,
  pub limit: u32,
  pub columns: Vec<ColumnSpec>,
  pub label: Option<String>,
  /// Alias of the account the query runs against
  pub account: String,
}

impl QueryConfig {
  /// A config with every field at its default.
  pub fn new(ctx: &ParseContext<'_>) -> Self {
    Self {
      format: ResultFormat::default(),
      query: String::new(),
      limit: ctx.default_limit,
      columns: Vec::new(),
      label: None,
      account: ctx.account.alias.clone(),
    }
  }

  /// Parse a query block. Fails on the first invalid line.
  pub fn parse(source: &str, ctx: &ParseContext<'_>) -> Result<Self, QueryError> {
    let mut config = Self::new(ctx);
    let lines: Vec<&str> = source
      .lines()
      .filter(|line| !line.trim().is_empty() && !is_comment(line))
      .collect();

    if let [line] = lines.as_slice() {
      if recognized_key(line).is_none() {
        config.query = line.trim().to_string();
        return Ok(config);
      }
    }

    for line in lines {
      let (key, value) = line.split_once(':').unwrap_or((line, ""));
      let value = value.trim();

      match key.trim().to_lowercase().as_str() {
        KEY_TYPE => config.format = value.parse()?,
        KEY_QUERY => config.query = value.to_string(),
        KEY_LIMIT => config.limit = parse_limit(value)?,
        KEY_COLUMNS => {
          config.columns = value
            .split(',')
            .filter(|column| !column.trim().is_empty())
            .map(|column| ColumnSpec::parse(column, ctx.account.fields()))
            .collect::<Result<_, _>>()?
        }
        KEY_LABEL => config.label = Some(value.to_string()),
        _ => return Err(QueryError::InvalidKey(key.trim().to_string())),
      }
    }

    if config.format == ResultFormat::List && !config.columns.is_empty() {
      return Err(QueryError::IncompatibleOptions);
    }

    Ok(config)
  }

  /// Advanced-mode text that parses back to an equal config.
  pub fn to_raw_string(&self) -> String {
    let mut result = String::new();
    result.push_str(&format!("{}: {}\n", KEY_TYPE, self.format));
    result.push_str(&format!("{}: {}\n", KEY_QUERY, self.query));
    // A zero limit can only come from the configured default, which parsing reapplies
    if self.limit > 0 {
      result.push_str(&format!("{}: {}\n", KEY_LIMIT, self.limit));
    }
    if !self.columns.is_empty() {
      let columns: Vec<String> = self.columns.iter().map(ToString::to_string).collect();
      result.push_str(&format!("{}: {}\n", KEY_COLUMNS, columns.join(", ")));
    }
    if let Some(label) = &self.label {
      result.push_str(&format!("{}: {}\n", KEY_LABEL, label));
    }
    result
  }

  pub fn cache_key(&self) -> CacheKey {
    CacheKey::search(&self.account, &self.query, self.limit)
  }

  /// Columns to draw: the block's own, or `defaults` for a table without any.
  pub fn effective_columns<'a>(&'a self, defaults: &'a [ColumnSpec]) -> &'a [ColumnSpec] {
    if self.columns.is_empty() && self.format == ResultFormat::Table {
      defaults
    } else {
      &self.columns
    }
  }
}

/// The block wrapped in a `jira-search` fence.
impl fmt::Display for QueryConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "```{}\n{}```", SEARCH_FENCE, self.to_raw_string())
  }
}

fn is_comment(line: &str) -> bool {
  line.trim_start().starts_with('#')
}

fn recognized_key(line: &str) -> Option<&'static str> {
  let (key, _) = line.split_once(':')?;
  let key = key.trim().to_lowercase();
  KEYS.iter().copied().find(|known| *known == key)
}

fn parse_limit(value: &str) -> Result<u32, QueryError> {
  value
    .parse::<u32>()
    .ok()
    .filter(|limit| *limit > 0)
    .ok_or_else(|| QueryError::InvalidLimit(value.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::jira::account::FieldCatalog;
  use crate::search::column::FieldType;

  fn account() -> Account {
    Account::new("work", "https://jira.example.com")
      .with_fields(FieldCatalog::from_pairs([("10010", "Story Points")]))
  }

  fn parse(source: &str) -> Result<QueryConfig, QueryError> {
    let account = account();
    QueryConfig::parse(
      source,
      &ParseContext {
        account: &account,
        default_limit: 10,
      },
    )
  }

  #[test]
  fn test_basic_mode() {
    let config = parse("project = X AND status = Open").unwrap();
    assert_eq!(config.query, "project = X AND status = Open");
    assert_eq!(config.format, ResultFormat::Table);
    assert_eq!(config.limit, 10);
    assert!(config.columns.is_empty());
    assert_eq!(config.account, "work");
  }

  #[test]
  fn test_basic_mode_allows_colons() {
    let config = parse("updated > -1d AND summary ~ \"foo: bar\"").unwrap();
    assert_eq!(config.query, "updated > -1d AND summary ~ \"foo: bar\"");
  }

  #[test]
  fn test_advanced_mode() {
    let config = parse(
      "# my search\n\
       type: table\n\
       \n\
       query: project = X AND created > \"2024-01-01 10:00\"\n\
       limit: 5\n\
       columns: key, -status, $Story Points, NOTES.owner,\n\
       label: Mine",
    )
    .unwrap();

    assert_eq!(config.format, ResultFormat::Table);
    assert_eq!(config.query, "project = X AND created > \"2024-01-01 10:00\"");
    assert_eq!(config.limit, 5);
    assert_eq!(
      config.columns,
      vec![
        ColumnSpec::new(FieldType::Key),
        ColumnSpec::new(FieldType::Status).compact(),
        ColumnSpec::new(FieldType::CustomField).with_extra("Story Points"),
        ColumnSpec::new(FieldType::Notes).with_extra("owner"),
      ]
    );
    assert_eq!(config.label.as_deref(), Some("Mine"));
  }

  #[test]
  fn test_keys_are_case_insensitive() {
    let config = parse("TYPE: List\n  Query : project = X").unwrap();
    assert_eq!(config.format, ResultFormat::List);
    assert_eq!(config.query, "project = X");
  }

  #[test]
  fn test_invalid_key() {
    assert_eq!(
      parse("query: project = X\nsort: key"),
      Err(QueryError::InvalidKey("sort".to_string()))
    );
  }

  #[test]
  fn test_invalid_type() {
    assert_eq!(
      parse("type: board\nquery: x"),
      Err(QueryError::InvalidType("board".to_string()))
    );
  }

  #[test]
  fn test_invalid_limit() {
    for bad in ["0", "-3", "ten", "5abc", ""] {
      assert_eq!(
        parse(&format!("query: x\nlimit: {bad}")),
        Err(QueryError::InvalidLimit(bad.to_string()))
      );
    }
  }

  #[test]
  fn test_invalid_column_propagates() {
    assert_eq!(
      parse("query: x\ncolumns: key, bogus"),
      Err(QueryError::InvalidColumn("BOGUS".to_string()))
    );
  }

  #[test]
  fn test_list_with_columns_is_rejected() {
    assert_eq!(
      parse("type: list\ncolumns: KEY"),
      Err(QueryError::IncompatibleOptions)
    );
  }

  #[test]
  fn test_empty_label_is_kept() {
    let config = parse("query: x\nlabel:").unwrap();
    assert_eq!(config.label.as_deref(), Some(""));
  }

  #[test]
  fn test_round_trip() {
    let config = QueryConfig {
      format: ResultFormat::Table,
      query: "project = X AND labels = \"a:b\"".to_string(),
      limit: 42,
      columns: vec![
        ColumnSpec::new(FieldType::Key).compact(),
        ColumnSpec::new(FieldType::CustomField).with_extra("10010"),
        ColumnSpec::new(FieldType::CustomField).compact().with_extra("Story Points"),
        ColumnSpec::new(FieldType::Notes).with_extra("meta.owner"),
        ColumnSpec::new(FieldType::Notes).compact(),
      ],
      label: Some("Sprint".to_string()),
      account: "work".to_string(),
    };

    assert_eq!(parse(&config.to_raw_string()), Ok(config));
  }

  #[test]
  fn test_round_trip_of_parsed_blocks() {
    for source in [
      "project = X",
      "type: list\nquery: assignee = currentUser()",
      "query: a\nlimit: 3\ncolumns: -due_date, summary\nlabel: ",
    ] {
      let config = parse(source).unwrap();
      assert_eq!(parse(&config.to_raw_string()), Ok(config));
    }
  }

  #[test]
  fn test_round_trip_with_zero_default_limit() {
    let account = account();
    let ctx = ParseContext {
      account: &account,
      default_limit: 0,
    };
    let config = QueryConfig::parse("project = X", &ctx).unwrap();

    let raw = config.to_raw_string();
    assert_eq!(raw, "type: TABLE\nquery: project = X\n");
    assert_eq!(QueryConfig::parse(&raw, &ctx), Ok(config));
  }

  #[test]
  fn test_fenced_display() {
    let config = parse("project = X").unwrap();
    assert_eq!(
      config.to_string(),
      "```jira-search\ntype: TABLE\nquery: project = X\nlimit: 10\n```"
    );
  }

  #[test]
  fn test_cache_key_is_stable_across_reparses() {
    let a = parse("query: project = X\nlimit: 5").unwrap();
    let b = parse("limit: 5\nquery:   project = X").unwrap();
    assert_eq!(a.cache_key().cache_hash(), b.cache_key().cache_hash());
    assert_eq!(a.cache_key(), CacheKey::search("work", "project = X", 5));
  }

  #[test]
  fn test_effective_columns() {
    let defaults = vec![ColumnSpec::new(FieldType::Key)];
    let table = parse("project = X").unwrap();
    assert_eq!(table.effective_columns(&defaults), defaults.as_slice());

    let list = parse("type: list\nquery: x").unwrap();
    assert!(list.effective_columns(&defaults).is_empty());
  }
}
