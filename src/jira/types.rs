//! Normalized issue records.
//!
//! Every field of the template is always present, so renderers read
//! `issue.fields.assignee.display_name` without checking for absence. A
//! missing value is the empty string, zero, an empty list or `false`.
//! `Issue::default()` is the template itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Issue {
  pub id: String,
  pub key: String,
  pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueFields {
  pub aggregateprogress: Progress,
  pub aggregatetimeestimate: u64,
  pub aggregatetimeoriginalestimate: u64,
  pub aggregatetimespent: u64,
  pub assignee: User,
  pub components: Vec<Component>,
  pub created: String,
  pub creator: User,
  pub description: String,
  pub duedate: String,
  pub environment: String,
  #[serde(rename = "fixVersions")]
  pub fix_versions: Vec<Version>,
  pub issuelinks: Vec<IssueLink>,
  pub issuetype: IconName,
  pub labels: Vec<String>,
  #[serde(rename = "lastViewed")]
  pub last_viewed: String,
  pub parent: IssueRef,
  pub priority: IconName,
  pub progress: Progress,
  pub project: Project,
  pub reporter: User,
  pub resolution: Resolution,
  pub resolutiondate: String,
  pub status: Status,
  pub subtasks: Vec<IssueRef>,
  pub summary: String,
  pub timeestimate: u64,
  pub timeoriginalestimate: u64,
  pub timespent: u64,
  pub updated: String,
  pub versions: Vec<Version>,
  pub votes: Votes,
  pub watches: Watches,
  pub worklog: Worklog,
  /// `customfield_<id>` entries, carried through untouched.
  #[serde(flatten)]
  pub custom_fields: BTreeMap<String, Value>,
}

impl IssueFields {
  pub fn custom_field(&self, id: &str) -> Option<&Value> {
    self.custom_fields.get(&format!("customfield_{id}"))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
  pub active: bool,
  #[serde(rename = "avatarUrls")]
  pub avatar_urls: AvatarUrls,
  #[serde(rename = "displayName")]
  pub display_name: String,
  #[serde(rename = "emailAddress")]
  pub email_address: String,
  #[serde(rename = "self")]
  pub self_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarUrls {
  #[serde(rename = "16x16")]
  pub x16: String,
  #[serde(rename = "24x24")]
  pub x24: String,
  #[serde(rename = "32x32")]
  pub x32: String,
  #[serde(rename = "48x48")]
  pub x48: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
  pub percent: u64,
  pub progress: u64,
  pub total: u64,
}

/// Issue type and priority share this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconName {
  #[serde(rename = "iconUrl")]
  pub icon_url: String,
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
  pub key: String,
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
  pub description: String,
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Status {
  pub description: String,
  pub name: String,
  #[serde(rename = "statusCategory")]
  pub status_category: StatusCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCategory {
  #[serde(rename = "colorName")]
  pub color_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Votes {
  pub votes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watches {
  #[serde(rename = "watchCount")]
  pub watch_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Worklog {
  pub worklogs: Vec<Value>,
}

// ============================================================================
// List elements
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Component {
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Version {
  pub name: String,
  pub released: bool,
}

/// A reference to another issue, as found in links, subtasks and `parent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueRef {
  pub id: String,
  pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueLink {
  #[serde(rename = "type")]
  pub link_type: LinkType,
  #[serde(rename = "inwardIssue", skip_serializing_if = "Option::is_none")]
  pub inward_issue: Option<IssueRef>,
  #[serde(rename = "outwardIssue", skip_serializing_if = "Option::is_none")]
  pub outward_issue: Option<IssueRef>,
}

impl IssueLink {
  /// The issue on the other end and the phrase describing the relation.
  ///
  /// A link carrying an outward issue is read from that issue's side, so it
  /// uses the inward phrase.
  pub fn target(&self) -> Option<(&IssueRef, &str)> {
    match (&self.outward_issue, &self.inward_issue) {
      (Some(outward), _) => Some((outward, self.link_type.inward.as_str())),
      (None, Some(inward)) => Some((inward, self.link_type.outward.as_str())),
      (None, None) => None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkType {
  pub name: String,
  pub inward: String,
  pub outward: String,
}

/// Results of one JQL search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
  pub issues: Vec<Issue>,
  pub total: u64,
}
