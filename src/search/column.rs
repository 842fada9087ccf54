//! Column tokens of a search table: `KEY`, `-STATUS`, `$Story Points`,
//! `NOTES.status`.

use std::fmt;

use crate::error::QueryError;
use crate::jira::account::FieldCatalog;

/// Prefix requesting the abbreviated rendering of a column.
pub const COMPACT_SYMBOL: &str = "-";

const CUSTOM_FIELD_SYMBOL: &str = "$";
const NOTES_PREFIX: &str = "NOTES.";
const DEPRECATED_COMPACT_SYMBOL: &str = "#";

/// Every column a search table can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
  AggregateProgress,
  AggregateTimeEstimated,
  AggregateTimeOriginalEstimate,
  AggregateTimeSpent,
  Assignee,
  Components,
  Created,
  Description,
  DueDate,
  Environment,
  FixVersions,
  LinkedIssues,
  Key,
  Labels,
  LastViewed,
  Parent,
  Priority,
  Progress,
  Project,
  Reporter,
  Resolution,
  ResolutionDate,
  Status,
  Summary,
  TimeEstimate,
  TimeOriginalEstimate,
  TimeSpent,
  Type,
  Updated,
  Creator,
  SubTasks,
  Watches,
  Votes,
  CustomField,
  Notes,
}

impl FieldType {
  pub const ALL: [FieldType; 35] = [
    FieldType::AggregateProgress,
    FieldType::AggregateTimeEstimated,
    FieldType::AggregateTimeOriginalEstimate,
    FieldType::AggregateTimeSpent,
    FieldType::Assignee,
    FieldType::Components,
    FieldType::Created,
    FieldType::Description,
    FieldType::DueDate,
    FieldType::Environment,
    FieldType::FixVersions,
    FieldType::LinkedIssues,
    FieldType::Key,
    FieldType::Labels,
    FieldType::LastViewed,
    FieldType::Parent,
    FieldType::Priority,
    FieldType::Progress,
    FieldType::Project,
    FieldType::Reporter,
    FieldType::Resolution,
    FieldType::ResolutionDate,
    FieldType::Status,
    FieldType::Summary,
    FieldType::TimeEstimate,
    FieldType::TimeOriginalEstimate,
    FieldType::TimeSpent,
    FieldType::Type,
    FieldType::Updated,
    FieldType::Creator,
    FieldType::SubTasks,
    FieldType::Watches,
    FieldType::Votes,
    FieldType::CustomField,
    FieldType::Notes,
  ];

  /// Identifier used in column tokens.
  pub fn name(self) -> &'static str {
    match self {
      Self::AggregateProgress => "AGGREGATE_PROGRESS",
      Self::AggregateTimeEstimated => "AGGREGATE_TIME_ESTIMATED",
      Self::AggregateTimeOriginalEstimate => "AGGREGATE_TIME_ORIGINAL_ESTIMATE",
      Self::AggregateTimeSpent => "AGGREGATE_TIME_SPENT",
      Self::Assignee => "ASSIGNEE",
      Self::Components => "COMPONENTS",
      Self::Created => "CREATED",
      Self::Description => "DESCRIPTION",
      Self::DueDate => "DUE_DATE",
      Self::Environment => "ENVIRONMENT",
      Self::FixVersions => "FIX_VERSIONS",
      Self::LinkedIssues => "LINKED_ISSUES",
      Self::Key => "KEY",
      Self::Labels => "LABELS",
      Self::LastViewed => "LAST_VIEWED",
      Self::Parent => "PARENT",
      Self::Priority => "PRIORITY",
      Self::Progress => "PROGRESS",
      Self::Project => "PROJECT",
      Self::Reporter => "REPORTER",
      Self::Resolution => "RESOLUTION",
      Self::ResolutionDate => "RESOLUTION_DATE",
      Self::Status => "STATUS",
      Self::Summary => "SUMMARY",
      Self::TimeEstimate => "TIME_ESTIMATE",
      Self::TimeOriginalEstimate => "TIME_ORIGINAL_ESTIMATE",
      Self::TimeSpent => "TIME_SPENT",
      Self::Type => "TYPE",
      Self::Updated => "UPDATED",
      Self::Creator => "CREATOR",
      Self::SubTasks => "SUB_TASKS",
      Self::Watches => "WATCHES",
      Self::Votes => "VOTES",
      Self::CustomField => "CUSTOM_FIELD",
      Self::Notes => "NOTES",
    }
  }

  /// Table header text.
  pub fn label(self) -> &'static str {
    match self {
      Self::AggregateProgress => "Σ Progress",
      Self::AggregateTimeEstimated => "Σ Remaining Estimated",
      Self::AggregateTimeOriginalEstimate => "Σ Original Estimate",
      Self::AggregateTimeSpent => "Σ Time Spent",
      Self::Assignee => "Assignee",
      Self::Components => "Components",
      Self::Created => "Created",
      Self::Description => "Description",
      Self::DueDate => "Due Date",
      Self::Environment => "Environment",
      Self::FixVersions => "Fix Versions",
      Self::LinkedIssues => "Linked Issues",
      Self::Key => "Key",
      Self::Labels => "Labels",
      Self::LastViewed => "Last Viewed",
      Self::Parent => "Parent",
      Self::Priority => "Priority",
      Self::Progress => "Progress",
      Self::Project => "Project",
      Self::Reporter => "Reporter",
      Self::Resolution => "Resolution",
      Self::ResolutionDate => "Resolution Date",
      Self::Status => "Status",
      Self::Summary => "Summary",
      Self::TimeEstimate => "Remaining Estimate",
      Self::TimeOriginalEstimate => "Original Estimate",
      Self::TimeSpent => "Time Spent",
      Self::Type => "Type",
      Self::Updated => "Updated",
      Self::Creator => "Creator",
      Self::SubTasks => "Sub Tasks",
      Self::Watches => "Watches",
      Self::Votes => "Votes",
      Self::CustomField => "Custom field",
      Self::Notes => "Notes",
    }
  }

  /// Look up an identifier. Expects the uppercase form.
  pub fn from_name(name: &str) -> Option<Self> {
    Self::ALL.iter().copied().find(|field| field.name() == name)
  }

  /// Whether columns of this type carry an `extra` argument.
  pub fn takes_extra(self) -> bool {
    matches!(self, Self::CustomField | Self::Notes)
  }
}

impl fmt::Display for FieldType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// One parsed column token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
  pub field_type: FieldType,
  pub compact: bool,
  /// Custom field id or name for `CUSTOM_FIELD`, front matter path for `NOTES`
  pub extra: Option<String>,
}

impl ColumnSpec {
  pub fn new(field_type: FieldType) -> Self {
    Self {
      field_type,
      compact: false,
      extra: None,
    }
  }

  pub fn compact(mut self) -> Self {
    self.compact = true;
    self
  }

  pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
    self.extra = Some(extra.into());
    self
  }

  /// Parse a single column token.
  ///
  /// Custom field names are checked against `fields`; numeric ids are
  /// accepted as-is.
  pub fn parse(token: &str, fields: &FieldCatalog) -> Result<Self, QueryError> {
    let token = token.trim();
    let (compact, token) = match token.strip_prefix(COMPACT_SYMBOL) {
      Some(rest) => (true, rest.trim_start()),
      None => (false, token),
    };

    if let Some(identifier) = token.strip_prefix(CUSTOM_FIELD_SYMBOL) {
      if !is_field_id(identifier) && !fields.has_custom_field_name(identifier) {
        return Err(QueryError::UnknownCustomField(identifier.to_string()));
      }
      return Ok(Self {
        field_type: FieldType::CustomField,
        compact,
        extra: Some(identifier.to_string()),
      });
    }

    if let Some(path) = strip_prefix_ignore_case(token, NOTES_PREFIX) {
      return Ok(Self {
        field_type: FieldType::Notes,
        compact,
        extra: Some(path.to_string()).filter(|p| !p.is_empty()),
      });
    }

    let name = token.to_uppercase();
    match FieldType::from_name(&name) {
      // A custom field column needs an identifier, which only `$` supplies
      Some(field_type) if field_type != FieldType::CustomField => Ok(Self {
        field_type,
        compact,
        extra: None,
      }),
      _ if name.starts_with(DEPRECATED_COMPACT_SYMBOL) => Err(QueryError::DeprecatedCompactMarker),
      _ => Err(QueryError::InvalidColumn(name)),
    }
  }

  /// Header text for a table of this column.
  pub fn header(&self) -> String {
    let name = match (&self.field_type, &self.extra) {
      (FieldType::Notes, Some(path)) => path.as_str(),
      _ => self.field_type.label(),
    };
    if self.compact {
      name
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_default()
    } else {
      name.to_string()
    }
  }
}

/// Serializes back to the token the column was parsed from.
impl fmt::Display for ColumnSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.compact {
      f.write_str(COMPACT_SYMBOL)?;
    }
    match (self.field_type, &self.extra) {
      (FieldType::CustomField, extra) => {
        write!(f, "{}{}", CUSTOM_FIELD_SYMBOL, extra.as_deref().unwrap_or(""))
      }
      (FieldType::Notes, Some(path)) => write!(f, "{}{}", NOTES_PREFIX, path),
      (field_type, _) => f.write_str(field_type.name()),
    }
  }
}

/// Positive integer custom field id, as opposed to a field name.
pub fn is_field_id(identifier: &str) -> bool {
  identifier.parse::<u64>().is_ok_and(|id| id > 0)
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
  let head = text.get(..prefix.len())?;
  if head.eq_ignore_ascii_case(prefix) {
    Some(&text[prefix.len()..])
  } else {
    None
  }
}
