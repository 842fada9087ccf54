//! Serde-deserializable types matching Jira API responses, and the
//! normalizer that folds them into the always-populated [`Issue`] shape.
//!
//! Raw records mirror the template with every field optional. Normalizing
//! starts from `Issue::default()` and merges the raw record over it:
//! non-empty text, non-zero numbers and `true` replace the default, lists
//! always replace it, nested records merge recursively, and absent or null
//! values keep the default.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::types::{
  AvatarUrls, Component, IconName, Issue, IssueFields, IssueLink, IssueRef, Progress, Project,
  Resolution, SearchResults, Status, StatusCategory, User, Version, Votes, Watches, Worklog,
};

/// Re-serialize a value through JSON to convert between compatible types.
pub fn reserialize<T: DeserializeOwned>(value: impl Serialize) -> serde_json::Result<T> {
  serde_json::from_value(serde_json::to_value(value)?)
}

// ============================================================================
// Raw issue records
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIssue {
  pub id: Option<String>,
  pub key: Option<String>,
  pub fields: Option<RawIssueFields>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIssueFields {
  pub aggregateprogress: Option<RawProgress>,
  pub aggregatetimeestimate: Option<u64>,
  pub aggregatetimeoriginalestimate: Option<u64>,
  pub aggregatetimespent: Option<u64>,
  pub assignee: Option<RawUser>,
  pub components: Option<Vec<Component>>,
  pub created: Option<String>,
  pub creator: Option<RawUser>,
  // Plain text (API v2) or an ADF document (API v3)
  pub description: Option<Value>,
  pub duedate: Option<String>,
  pub environment: Option<String>,
  #[serde(rename = "fixVersions")]
  pub fix_versions: Option<Vec<Version>>,
  pub issuelinks: Option<Vec<IssueLink>>,
  pub issuetype: Option<RawIconName>,
  pub labels: Option<Vec<String>>,
  #[serde(rename = "lastViewed")]
  pub last_viewed: Option<String>,
  pub parent: Option<IssueRef>,
  pub priority: Option<RawIconName>,
  pub progress: Option<RawProgress>,
  pub project: Option<RawProject>,
  pub reporter: Option<RawUser>,
  pub resolution: Option<RawResolution>,
  pub resolutiondate: Option<String>,
  pub status: Option<RawStatus>,
  pub subtasks: Option<Vec<IssueRef>>,
  pub summary: Option<String>,
  pub timeestimate: Option<u64>,
  pub timeoriginalestimate: Option<u64>,
  pub timespent: Option<u64>,
  pub updated: Option<String>,
  pub versions: Option<Vec<Version>>,
  pub votes: Option<RawVotes>,
  pub watches: Option<RawWatches>,
  pub worklog: Option<RawWorklog>,
  // Custom fields and anything else the server sends
  #[serde(flatten)]
  pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawUser {
  pub active: Option<bool>,
  #[serde(rename = "avatarUrls")]
  pub avatar_urls: Option<RawAvatarUrls>,
  #[serde(rename = "displayName")]
  pub display_name: Option<String>,
  #[serde(rename = "emailAddress")]
  pub email_address: Option<String>,
  #[serde(rename = "self")]
  pub self_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAvatarUrls {
  #[serde(rename = "16x16")]
  pub x16: Option<String>,
  #[serde(rename = "24x24")]
  pub x24: Option<String>,
  #[serde(rename = "32x32")]
  pub x32: Option<String>,
  #[serde(rename = "48x48")]
  pub x48: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProgress {
  pub percent: Option<u64>,
  pub progress: Option<u64>,
  pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIconName {
  #[serde(rename = "iconUrl")]
  pub icon_url: Option<String>,
  pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawProject {
  pub key: Option<String>,
  pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawResolution {
  pub description: Option<String>,
  pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStatus {
  pub description: Option<String>,
  pub name: Option<String>,
  #[serde(rename = "statusCategory")]
  pub status_category: Option<RawStatusCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawStatusCategory {
  #[serde(rename = "colorName")]
  pub color_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawVotes {
  pub votes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawWatches {
  #[serde(rename = "watchCount")]
  pub watch_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawWorklog {
  pub worklogs: Option<Vec<Value>>,
}

// ============================================================================
// Other endpoint responses
// ============================================================================

/// `/search` response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchResults {
  pub issues: Vec<RawIssue>,
  #[serde(rename = "startAt")]
  pub start_at: u64,
  #[serde(rename = "maxResults")]
  pub max_results: u64,
  pub total: u64,
}

/// One entry of the `/field` response
#[derive(Debug, Clone, Deserialize)]
pub struct ApiField {
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub custom: bool,
  pub schema: Option<ApiFieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiFieldSchema {
  #[serde(rename = "type", default)]
  pub field_type: String,
  pub items: Option<String>,
  #[serde(rename = "customId")]
  pub custom_id: Option<u64>,
}

// ============================================================================
// Normalization
// ============================================================================

/// Fill every gap of a raw issue from the template. `None` stays `None`.
pub fn normalize(raw: Option<RawIssue>) -> Option<Issue> {
  raw.map(Issue::from)
}

impl From<RawIssue> for Issue {
  fn from(raw: RawIssue) -> Self {
    let mut issue = Issue::default();
    issue.merge(raw);
    issue
  }
}

impl From<RawSearchResults> for SearchResults {
  fn from(raw: RawSearchResults) -> Self {
    SearchResults {
      issues: raw.issues.into_iter().map(Issue::from).collect(),
      total: raw.total,
    }
  }
}

/// Overlay a raw record onto an already populated value.
trait Merge {
  type Raw;

  fn merge(&mut self, raw: Self::Raw);
}

fn merge_field<T: Merge>(target: &mut T, raw: Option<T::Raw>) {
  if let Some(raw) = raw {
    target.merge(raw);
  }
}

impl Merge for String {
  type Raw = String;

  fn merge(&mut self, raw: String) {
    if !raw.is_empty() {
      *self = raw;
    }
  }
}

impl Merge for u64 {
  type Raw = u64;

  fn merge(&mut self, raw: u64) {
    if raw != 0 {
      *self = raw;
    }
  }
}

impl Merge for bool {
  type Raw = bool;

  fn merge(&mut self, raw: bool) {
    if raw {
      *self = raw;
    }
  }
}

impl<T> Merge for Vec<T> {
  type Raw = Vec<T>;

  fn merge(&mut self, raw: Vec<T>) {
    *self = raw;
  }
}

impl Merge for Issue {
  type Raw = RawIssue;

  fn merge(&mut self, raw: RawIssue) {
    merge_field(&mut self.id, raw.id);
    merge_field(&mut self.key, raw.key);
    merge_field(&mut self.fields, raw.fields);
  }
}

impl Merge for IssueFields {
  type Raw = RawIssueFields;

  fn merge(&mut self, raw: RawIssueFields) {
    merge_field(&mut self.aggregateprogress, raw.aggregateprogress);
    merge_field(&mut self.aggregatetimeestimate, raw.aggregatetimeestimate);
    merge_field(
      &mut self.aggregatetimeoriginalestimate,
      raw.aggregatetimeoriginalestimate,
    );
    merge_field(&mut self.aggregatetimespent, raw.aggregatetimespent);
    merge_field(&mut self.assignee, raw.assignee);
    merge_field(&mut self.components, raw.components);
    merge_field(&mut self.created, raw.created);
    merge_field(&mut self.creator, raw.creator);
    merge_field(
      &mut self.description,
      raw.description.as_ref().and_then(extract_description),
    );
    merge_field(&mut self.duedate, raw.duedate);
    merge_field(&mut self.environment, raw.environment);
    merge_field(&mut self.fix_versions, raw.fix_versions);
    merge_field(&mut self.issuelinks, raw.issuelinks);
    merge_field(&mut self.issuetype, raw.issuetype);
    merge_field(&mut self.labels, raw.labels);
    merge_field(&mut self.last_viewed, raw.last_viewed);
    merge_field(&mut self.parent, raw.parent);
    merge_field(&mut self.priority, raw.priority);
    merge_field(&mut self.progress, raw.progress);
    merge_field(&mut self.project, raw.project);
    merge_field(&mut self.reporter, raw.reporter);
    merge_field(&mut self.resolution, raw.resolution);
    merge_field(&mut self.resolutiondate, raw.resolutiondate);
    merge_field(&mut self.status, raw.status);
    merge_field(&mut self.subtasks, raw.subtasks);
    merge_field(&mut self.summary, raw.summary);
    merge_field(&mut self.timeestimate, raw.timeestimate);
    merge_field(&mut self.timeoriginalestimate, raw.timeoriginalestimate);
    merge_field(&mut self.timespent, raw.timespent);
    merge_field(&mut self.updated, raw.updated);
    merge_field(&mut self.versions, raw.versions);
    merge_field(&mut self.votes, raw.votes);
    merge_field(&mut self.watches, raw.watches);
    merge_field(&mut self.worklog, raw.worklog);

    for (name, value) in raw.extra {
      if name.starts_with("customfield_") && is_truthy(&value) {
        self.custom_fields.insert(name, value);
      }
    }
  }
}

impl Merge for User {
  type Raw = RawUser;

  fn merge(&mut self, raw: RawUser) {
    merge_field(&mut self.active, raw.active);
    merge_field(&mut self.avatar_urls, raw.avatar_urls);
    merge_field(&mut self.display_name, raw.display_name);
    merge_field(&mut self.email_address, raw.email_address);
    merge_field(&mut self.self_url, raw.self_url);
  }
}

impl Merge for AvatarUrls {
  type Raw = RawAvatarUrls;

  fn merge(&mut self, raw: RawAvatarUrls) {
    merge_field(&mut self.x16, raw.x16);
    merge_field(&mut self.x24, raw.x24);
    merge_field(&mut self.x32, raw.x32);
    merge_field(&mut self.x48, raw.x48);
  }
}

impl Merge for Progress {
  type Raw = RawProgress;

  fn merge(&mut self, raw: RawProgress) {
    merge_field(&mut self.percent, raw.percent);
    merge_field(&mut self.progress, raw.progress);
    merge_field(&mut self.total, raw.total);
  }
}

impl Merge for IconName {
  type Raw = RawIconName;

  fn merge(&mut self, raw: RawIconName) {
    merge_field(&mut self.icon_url, raw.icon_url);
    merge_field(&mut self.name, raw.name);
  }
}

impl Merge for IssueRef {
  type Raw = IssueRef;

  fn merge(&mut self, raw: IssueRef) {
    self.id.merge(raw.id);
    self.key.merge(raw.key);
  }
}

impl Merge for Project {
  type Raw = RawProject;

  fn merge(&mut self, raw: RawProject) {
    merge_field(&mut self.key, raw.key);
    merge_field(&mut self.name, raw.name);
  }
}

impl Merge for Resolution {
  type Raw = RawResolution;

  fn merge(&mut self, raw: RawResolution) {
    merge_field(&mut self.description, raw.description);
    merge_field(&mut self.name, raw.name);
  }
}

impl Merge for Status {
  type Raw = RawStatus;

  fn merge(&mut self, raw: RawStatus) {
    merge_field(&mut self.description, raw.description);
    merge_field(&mut self.name, raw.name);
    merge_field(&mut self.status_category, raw.status_category);
  }
}

impl Merge for StatusCategory {
  type Raw = RawStatusCategory;

  fn merge(&mut self, raw: RawStatusCategory) {
    merge_field(&mut self.color_name, raw.color_name);
  }
}

impl Merge for Votes {
  type Raw = RawVotes;

  fn merge(&mut self, raw: RawVotes) {
    merge_field(&mut self.votes, raw.votes);
  }
}

impl Merge for Watches {
  type Raw = RawWatches;

  fn merge(&mut self, raw: RawWatches) {
    merge_field(&mut self.watch_count, raw.watch_count);
  }
}

impl Merge for Worklog {
  type Raw = RawWorklog;

  fn merge(&mut self, raw: RawWorklog) {
    merge_field(&mut self.worklogs, raw.worklogs);
  }
}

// ============================================================================
// Helpers
// ============================================================================

fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

/// Extract plain text description from Jira's ADF or plain text format
fn extract_description(value: &Value) -> Option<String> {
  // API v2
  if let Some(s) = value.as_str() {
    return Some(s.to_string());
  }

  // API v3
  if let Some(content) = value.get("content").and_then(|v| v.as_array()) {
    let mut text = String::new();
    extract_adf_text(content, &mut text);
    let text = text.trim_end();
    if !text.is_empty() {
      return Some(text.to_string());
    }
  }

  None
}

/// Recursively extract text from ADF content
fn extract_adf_text(content: &[Value], output: &mut String) {
  for node in content {
    let Some(node_type) = node.get("type").and_then(|v| v.as_str()) else {
      continue;
    };
    match node_type {
      "text" => {
        if let Some(text) = node.get("text").and_then(|v| v.as_str()) {
          output.push_str(text);
        }
      }
      "hardBreak" => output.push('\n'),
      _ => {
        if let Some(children) = node.get("content").and_then(|v| v.as_array()) {
          extract_adf_text(children, output);
        }
        if node_type == "paragraph" || node_type == "heading" {
          output.push('\n');
        }
      }
    }
  }
}
