//! Turns one field of a normalized issue into a renderer-agnostic cell.
//!
//! Each [`FieldType`] has exactly one entry in [`RESOLVERS`]. Resolvers read
//! the normalized issue directly since every field is guaranteed present.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::fmt::Write;

use crate::error::CellError;
use crate::jira::account::{Account, StatusColor};
use crate::jira::types::{IconName, Issue, Progress, User};
use crate::notes::{new_note_path, Note, NoteMatcher};
use crate::search::{ColumnSpec, FieldType};

pub const LINK_GLYPH: &str = "🔗";
pub const DATE_GLYPH: &str = "🕑";
pub const LABELS_GLYPH: &str = "🏷️";
pub const NOTE_GLYPH: &str = "📙";
const COMPACT_TEXT_LENGTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
  Text,
  Link,
  IconAndText,
  User,
  Date,
  Duration,
  Percent,
  CompositeList,
}

/// Kind-specific presentation data.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellAux {
  #[default]
  None,
  Url(String),
  Icon(String),
  Avatar(String),
  Status(StatusColor),
  Items(Vec<CellItem>),
}

/// One entry of a composite cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellItem {
  /// Relation shown before the entry, e.g. `Blocks`
  pub label: Option<String>,
  pub text: String,
  pub title: String,
  pub url: Option<String>,
  pub emphasized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellDescriptor {
  pub kind: CellKind,
  pub primary_text: String,
  pub title: String,
  pub aux: CellAux,
}

impl CellDescriptor {
  pub fn new(kind: CellKind, primary_text: impl Into<String>, title: impl Into<String>) -> Self {
    Self {
      kind,
      primary_text: primary_text.into(),
      title: title.into(),
      aux: CellAux::None,
    }
  }

  pub fn text(primary_text: impl Into<String>) -> Self {
    Self::new(CellKind::Text, primary_text, "")
  }

  /// Blank cell used in place of one that failed to resolve.
  pub fn placeholder() -> Self {
    Self::text("")
  }

  pub fn with_aux(mut self, aux: CellAux) -> Self {
    self.aux = aux;
    self
  }

  fn list(items: Vec<CellItem>) -> Self {
    Self::new(CellKind::CompositeList, "", "").with_aux(CellAux::Items(items))
  }

  pub fn items(&self) -> &[CellItem] {
    match &self.aux {
      CellAux::Items(items) => items,
      _ => &[],
    }
  }
}

/// What a resolver may read besides the issue.
#[derive(Debug, Clone, Copy)]
pub struct CellContext<'a> {
  pub account: &'a Account,
  /// chrono format string
  pub date_format: &'a str,
  pub notes: &'a [Note],
  pub note_folder: &'a str,
}

type CellResult = Result<CellDescriptor, CellError>;

type ResolveFn = fn(&Issue, &ColumnSpec, &CellContext<'_>) -> CellResult;

pub struct Resolver {
  pub field: FieldType,
  pub resolve: ResolveFn,
}

/// Cell resolution rule of every field type.
pub const RESOLVERS: &[Resolver] = &[
  Resolver {
    field: FieldType::Key,
    resolve: resolve_key,
  },
  Resolver {
    field: FieldType::Parent,
    resolve: resolve_parent,
  },
  Resolver {
    field: FieldType::SubTasks,
    resolve: resolve_sub_tasks,
  },
  Resolver {
    field: FieldType::LinkedIssues,
    resolve: resolve_linked_issues,
  },
  Resolver {
    field: FieldType::Summary,
    resolve: |i, c, _| Ok(long_text(&i.fields.summary, c)),
  },
  Resolver {
    field: FieldType::Description,
    resolve: |i, c, _| Ok(long_text(&i.fields.description, c)),
  },
  Resolver {
    field: FieldType::Environment,
    resolve: |i, c, _| Ok(long_text(&i.fields.environment, c)),
  },
  Resolver {
    field: FieldType::Type,
    resolve: |i, c, _| Ok(icon(&i.fields.issuetype, c)),
  },
  Resolver {
    field: FieldType::Priority,
    resolve: resolve_priority,
  },
  Resolver {
    field: FieldType::Created,
    resolve: |i, c, x| Ok(date(&i.fields.created, c, x)),
  },
  Resolver {
    field: FieldType::Updated,
    resolve: |i, c, x| Ok(date(&i.fields.updated, c, x)),
  },
  Resolver {
    field: FieldType::DueDate,
    resolve: |i, c, x| Ok(date(&i.fields.duedate, c, x)),
  },
  Resolver {
    field: FieldType::ResolutionDate,
    resolve: |i, c, x| Ok(date(&i.fields.resolutiondate, c, x)),
  },
  Resolver {
    field: FieldType::LastViewed,
    resolve: |i, c, x| Ok(date(&i.fields.last_viewed, c, x)),
  },
  Resolver {
    field: FieldType::Reporter,
    resolve: |i, c, _| Ok(user(&i.fields.reporter, c)),
  },
  Resolver {
    field: FieldType::Assignee,
    resolve: |i, c, _| Ok(user(&i.fields.assignee, c)),
  },
  Resolver {
    field: FieldType::Creator,
    resolve: |i, c, _| Ok(user(&i.fields.creator, c)),
  },
  Resolver {
    field: FieldType::Status,
    resolve: resolve_status,
  },
  Resolver {
    field: FieldType::Resolution,
    resolve: resolve_resolution,
  },
  Resolver {
    field: FieldType::Labels,
    resolve: resolve_labels,
  },
  Resolver {
    field: FieldType::Project,
    resolve: resolve_project,
  },
  Resolver {
    field: FieldType::FixVersions,
    resolve: resolve_fix_versions,
  },
  Resolver {
    field: FieldType::Components,
    resolve: resolve_components,
  },
  Resolver {
    field: FieldType::AggregateTimeEstimated,
    resolve: |i, _, _| Ok(estimate(i.fields.aggregatetimeestimate)),
  },
  Resolver {
    field: FieldType::AggregateTimeOriginalEstimate,
    resolve: |i, _, _| Ok(estimate(i.fields.aggregatetimeoriginalestimate)),
  },
  Resolver {
    field: FieldType::AggregateTimeSpent,
    resolve: |i, _, _| Ok(estimate(i.fields.aggregatetimespent)),
  },
  Resolver {
    field: FieldType::TimeEstimate,
    resolve: |i, _, _| Ok(estimate(i.fields.timeestimate)),
  },
  Resolver {
    field: FieldType::TimeOriginalEstimate,
    resolve: |i, _, _| Ok(estimate(i.fields.timeoriginalestimate)),
  },
  Resolver {
    field: FieldType::TimeSpent,
    resolve: |i, _, _| Ok(estimate(i.fields.timespent)),
  },
  Resolver {
    field: FieldType::AggregateProgress,
    resolve: |i, _, _| Ok(progress(&i.fields.aggregateprogress)),
  },
  Resolver {
    field: FieldType::Progress,
    resolve: |i, _, _| Ok(progress(&i.fields.progress)),
  },
  Resolver {
    field: FieldType::Watches,
    resolve: |i, _, _| Ok(CellDescriptor::text(i.fields.watches.watch_count.to_string())),
  },
  Resolver {
    field: FieldType::Votes,
    resolve: |i, _, _| Ok(CellDescriptor::text(i.fields.votes.votes.to_string())),
  },
  Resolver {
    field: FieldType::CustomField,
    resolve: resolve_custom_field,
  },
  Resolver {
    field: FieldType::Notes,
    resolve: resolve_notes,
  },
];

/// Resolve one cell. Only custom field lookups can fail.
pub fn resolve_cell(
  issue: &Issue,
  column: &ColumnSpec,
  ctx: &CellContext<'_>,
) -> Result<CellDescriptor, CellError> {
  RESOLVERS
    .iter()
    .find(|resolver| resolver.field == column.field_type)
    .map_or_else(
      || Ok(CellDescriptor::placeholder()),
      |resolver| (resolver.resolve)(issue, column, ctx),
    )
}

// ============================================================================
// Issue references
// ============================================================================

fn issue_link(
  issue_key: &str,
  label: Option<String>,
  column: &ColumnSpec,
  ctx: &CellContext<'_>,
) -> CellItem {
  let url = ctx.account.issue_url(issue_key);
  let (text, title) = if column.compact {
    (LINK_GLYPH.to_string(), issue_key.to_string())
  } else {
    (issue_key.to_string(), url.clone())
  };
  CellItem {
    label,
    text,
    title,
    url: Some(url),
    emphasized: false,
  }
}

fn resolve_key(issue: &Issue, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellResult {
  if issue.key.is_empty() {
    return Ok(CellDescriptor::placeholder());
  }
  let link = issue_link(&issue.key, None, column, ctx);
  let url = link.url.unwrap_or_default();
  Ok(CellDescriptor::new(CellKind::Link, link.text, link.title).with_aux(CellAux::Url(url)))
}

fn resolve_parent(issue: &Issue, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellResult {
  let parent = &issue.fields.parent.key;
  let items = if parent.is_empty() {
    Vec::new()
  } else {
    vec![issue_link(parent, Some("Parent".to_string()), column, ctx)]
  };
  Ok(CellDescriptor::list(items))
}

fn resolve_sub_tasks(issue: &Issue, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellResult {
  let items = issue
    .fields
    .subtasks
    .iter()
    .filter(|subtask| !subtask.key.is_empty())
    .map(|subtask| issue_link(&subtask.key, Some("Sub-task".to_string()), column, ctx))
    .collect();
  Ok(CellDescriptor::list(items))
}

fn resolve_linked_issues(issue: &Issue, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellResult {
  let items = issue
    .fields
    .issuelinks
    .iter()
    .filter_map(|link| link.target())
    .map(|(target, relation)| issue_link(&target.key, Some(capitalize(relation)), column, ctx))
    .collect();
  Ok(CellDescriptor::list(items))
}

// ============================================================================
// Text-like fields
// ============================================================================

fn long_text(text: &str, column: &ColumnSpec) -> CellDescriptor {
  if !column.compact {
    return CellDescriptor::new(CellKind::Text, text, text);
  }
  let mut compact: String = text.chars().take(COMPACT_TEXT_LENGTH).collect();
  if text.chars().count() > COMPACT_TEXT_LENGTH {
    compact.push('…');
  }
  CellDescriptor::new(CellKind::Text, compact, text)
}

fn icon(value: &IconName, column: &ColumnSpec) -> CellDescriptor {
  let text = if column.compact { "" } else { value.name.as_str() };
  let cell = CellDescriptor::new(CellKind::IconAndText, text, &value.name);
  if value.icon_url.is_empty() {
    cell
  } else {
    cell.with_aux(CellAux::Icon(value.icon_url.clone()))
  }
}

fn resolve_priority(issue: &Issue, column: &ColumnSpec, _: &CellContext<'_>) -> CellResult {
  if issue.fields.priority.name.is_empty() {
    return Ok(CellDescriptor::text("-"));
  }
  Ok(icon(&issue.fields.priority, column))
}

fn user(user: &User, column: &ColumnSpec) -> CellDescriptor {
  let name = &user.display_name;
  let avatar = &user.avatar_urls.x16;
  if column.compact && !name.is_empty() && !avatar.is_empty() {
    CellDescriptor::new(CellKind::User, "", name).with_aux(CellAux::Avatar(avatar.clone()))
  } else {
    CellDescriptor::new(CellKind::User, name, name)
  }
}

fn resolve_status(issue: &Issue, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellResult {
  let status = &issue.fields.status;
  let color = ctx
    .account
    .status_color(&status.name, &status.status_category.color_name);
  let text = if column.compact {
    status.name.chars().take(1).flat_map(char::to_uppercase).collect()
  } else {
    status.name.clone()
  };
  Ok(
    CellDescriptor::new(CellKind::Text, text, &status.description)
      .with_aux(CellAux::Status(color)),
  )
}

fn resolve_resolution(issue: &Issue, _: &ColumnSpec, _: &CellContext<'_>) -> CellResult {
  let resolution = &issue.fields.resolution;
  Ok(CellDescriptor::new(CellKind::Text, &resolution.name, &resolution.description))
}

fn resolve_labels(issue: &Issue, column: &ColumnSpec, _: &CellContext<'_>) -> CellResult {
  let labels = &issue.fields.labels;
  Ok(if column.compact {
    CellDescriptor::new(CellKind::Text, LABELS_GLYPH, labels.join("\n"))
  } else {
    CellDescriptor::text(labels.join(", "))
  })
}

fn resolve_project(issue: &Issue, _: &ColumnSpec, _: &CellContext<'_>) -> CellResult {
  let project = &issue.fields.project;
  Ok(CellDescriptor::new(CellKind::Text, &project.key, &project.name))
}

fn resolve_fix_versions(issue: &Issue, _: &ColumnSpec, _: &CellContext<'_>) -> CellResult {
  let items = issue
    .fields
    .fix_versions
    .iter()
    .map(|version| CellItem {
      text: version.name.clone(),
      emphasized: version.released,
      ..CellItem::default()
    })
    .collect();
  Ok(CellDescriptor::list(items))
}

fn resolve_components(issue: &Issue, _: &ColumnSpec, _: &CellContext<'_>) -> CellResult {
  let names: Vec<&str> = issue
    .fields
    .components
    .iter()
    .map(|component| component.name.as_str())
    .collect();
  Ok(CellDescriptor::text(names.join(", ")))
}

fn resolve_custom_field(issue: &Issue, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellResult {
  let name = column.extra.as_deref().unwrap_or_default();
  let fields = ctx.account.fields();
  let id = fields
    .custom_field_id(name)
    .ok_or_else(|| CellError::UnknownCustomField(name.to_string()))?;

  let text = match issue.fields.custom_field(&id) {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.clone(),
    Some(Value::Number(n)) => n.to_string(),
    Some(other) => other.to_string(),
  };
  let title = fields.custom_field_name(&id).unwrap_or(name);
  Ok(CellDescriptor::new(CellKind::Text, text, title))
}

// ============================================================================
// Dates, durations and progress
// ============================================================================

fn date(value: &str, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellDescriptor {
  let formatted = format_date(value, ctx.date_format);
  let text = if column.compact { DATE_GLYPH.to_string() } else { formatted.clone() };
  CellDescriptor::new(CellKind::Date, text, formatted)
}

/// Calendar date of a Jira timestamp in its own offset. Values that don't
/// parse, or a format chrono rejects, yield the input unchanged.
pub fn format_date(value: &str, format: &str) -> String {
  if value.is_empty() {
    return String::new();
  }

  let date = DateTime::parse_from_rfc3339(value)
    .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
    .map(|timestamp| timestamp.date_naive())
    .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"));

  let Ok(date) = date else {
    return value.to_string();
  };
  let mut formatted = String::new();
  match write!(formatted, "{}", date.format(format)) {
    Ok(()) => formatted,
    Err(_) => value.to_string(),
  }
}

fn estimate(seconds: u64) -> CellDescriptor {
  CellDescriptor::new(CellKind::Duration, format_estimate(seconds), "")
}

/// `3725` seconds as `1h2m5s`, omitting zero components.
pub fn format_estimate(seconds: u64) -> String {
  let mut text = String::new();
  for (value, unit) in [(seconds / 3600, 'h'), (seconds % 3600 / 60, 'm'), (seconds % 60, 's')] {
    if value > 0 {
      text.push_str(&value.to_string());
      text.push(unit);
    }
  }
  text
}

fn progress(value: &Progress) -> CellDescriptor {
  CellDescriptor::new(CellKind::Percent, format!("{}%", percent(value)), "")
}

pub fn percent(value: &Progress) -> f64 {
  if value.progress > 0 && value.total > 0 {
    value.progress as f64 / value.total as f64 * 100.0
  } else {
    0.0
  }
}

// ============================================================================
// Notes
// ============================================================================

fn resolve_notes(issue: &Issue, column: &ColumnSpec, ctx: &CellContext<'_>) -> CellResult {
  let matcher =
    NoteMatcher::new(&issue.key).map_err(|e| CellError::InvalidNotePattern(e.to_string()))?;
  let connected = matcher.filter(ctx.notes);

  if connected.is_empty() {
    let path = new_note_path(ctx.note_folder, &issue.key);
    return Ok(CellDescriptor::list(vec![CellItem {
      text: "+".to_string(),
      title: "Create new note".to_string(),
      url: Some(path),
      ..CellItem::default()
    }]));
  }

  let mut items = Vec::new();
  for note in connected {
    match column.extra.as_deref() {
      Some(path) => items.extend(note.front_matter_values(path).into_iter().map(|value| CellItem {
        text: value,
        title: note.path.clone(),
        url: Some(note.path.clone()),
        ..CellItem::default()
      })),
      None => items.push(CellItem {
        text: if column.compact { NOTE_GLYPH.to_string() } else { note.stem().to_string() },
        title: note.path.clone(),
        url: Some(note.path.clone()),
        ..CellItem::default()
      }),
    }
  }
  Ok(CellDescriptor::list(items))
}

fn capitalize(text: &str) -> String {
  let mut chars = text.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}
