//! Accounts and the lookup tables renderers read from them.

use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::OnceLock;
use tokio::sync::OnceCell;
use url::Url;

use crate::search::column::is_field_id;

use super::api_types::ApiField;

/// Color family of a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
  Info,
  Warning,
  Success,
  Danger,
  Dark,
  Light,
}

impl StatusColor {
  /// Color used when neither the status name nor its category is known.
  pub const FALLBACK: StatusColor = StatusColor::Light;

  pub fn css_class(self) -> &'static str {
    match self {
      Self::Info => "is-info",
      Self::Warning => "is-warning",
      Self::Success => "is-success",
      Self::Danger => "is-danger",
      Self::Dark => "is-dark",
      Self::Light => "is-light",
    }
  }

  /// Color for a Jira status category color name.
  pub fn from_category(color_name: &str) -> Option<Self> {
    match color_name {
      "blue-gray" => Some(Self::Info),
      "yellow" => Some(Self::Warning),
      "green" => Some(Self::Success),
      "red" => Some(Self::Danger),
      "medium-gray" => Some(Self::Dark),
      _ => None,
    }
  }
}

/// Status names whose color doesn't follow their category.
pub const DEFAULT_STATUS_COLORS: &[(&str, StatusColor)] = &[
  ("New", StatusColor::Dark),
  ("Planning", StatusColor::Dark),
  ("To Do", StatusColor::Dark),
  ("In Progress", StatusColor::Info),
  ("Code Review", StatusColor::Info),
  ("Review", StatusColor::Info),
  ("Dev Complete", StatusColor::Info),
  ("Testing", StatusColor::Info),
  ("Release Pending", StatusColor::Success),
  ("Closed", StatusColor::Success),
];

/// Schema type of a field, as reported by `/field`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
  pub field_type: String,
  pub items: Option<String>,
}

/// Custom field names and ids of one Jira instance.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
  id_to_name: HashMap<String, String>,
  /// Keyed by lowercase name
  name_to_id: HashMap<String, String>,
  schemas: HashMap<String, FieldSchema>,
}

impl FieldCatalog {
  /// Build from `(numeric id, name)` pairs.
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let mut catalog = Self::default();
    for (id, name) in pairs {
      catalog.insert(id.into(), name.into(), None);
    }
    catalog
  }

  /// Build from the `/field` endpoint, keeping only custom fields.
  pub fn from_fields(fields: Vec<ApiField>) -> Self {
    let mut catalog = Self::default();
    for field in fields.into_iter().filter(|field| field.custom) {
      let id = match field.schema.as_ref().and_then(|s| s.custom_id) {
        Some(custom_id) => custom_id.to_string(),
        None => match field.id.strip_prefix("customfield_") {
          Some(id) => id.to_string(),
          None => continue,
        },
      };
      let schema = field.schema.map(|s| FieldSchema {
        field_type: s.field_type,
        items: s.items,
      });
      catalog.insert(id, field.name, schema);
    }
    catalog
  }

  fn insert(&mut self, id: String, name: String, schema: Option<FieldSchema>) {
    self.name_to_id.insert(name.to_lowercase(), id.clone());
    if let Some(schema) = schema {
      self.schemas.insert(id.clone(), schema);
    }
    self.id_to_name.insert(id, name);
  }

  pub fn is_empty(&self) -> bool {
    self.id_to_name.is_empty()
  }

  pub fn has_custom_field_name(&self, name: &str) -> bool {
    self.name_to_id.contains_key(&name.to_lowercase())
  }

  /// Numeric id for a custom field given by id or by name.
  pub fn custom_field_id(&self, name_or_id: &str) -> Option<String> {
    if is_field_id(name_or_id) {
      return Some(name_or_id.to_string());
    }
    self.name_to_id.get(&name_or_id.to_lowercase()).cloned()
  }

  pub fn custom_field_name(&self, id: &str) -> Option<&str> {
    self.id_to_name.get(id).map(String::as_str)
  }

  pub fn schema(&self, id: &str) -> Option<&FieldSchema> {
    self.schemas.get(id)
  }
}

/// A configured Jira instance.
///
/// The lookup tables are filled once, the first time something needs them,
/// and are never invalidated while the process runs.
#[derive(Debug, Clone)]
pub struct Account {
  pub alias: String,
  pub host: String,
  pub color: String,
  pub priority: u32,
  status_colors: HashMap<String, StatusColor>,
  fields: OnceCell<FieldCatalog>,
}

impl Account {
  pub fn new(alias: impl Into<String>, host: impl Into<String>) -> Self {
    Self {
      alias: alias.into(),
      host: host.into().trim_end_matches('/').to_string(),
      color: String::new(),
      priority: 1,
      status_colors: DEFAULT_STATUS_COLORS
        .iter()
        .map(|(name, color)| (name.to_string(), *color))
        .collect(),
      fields: OnceCell::new(),
    }
  }

  pub fn with_color(mut self, color: impl Into<String>) -> Self {
    self.color = color.into();
    self
  }

  pub fn with_priority(mut self, priority: u32) -> Self {
    self.priority = priority;
    self
  }

  /// Override the color of specific status names.
  pub fn with_status_colors<I>(mut self, overrides: I) -> Self
  where
    I: IntoIterator<Item = (String, StatusColor)>,
  {
    self.status_colors.extend(overrides);
    self
  }

  /// Preload the custom field catalog.
  pub fn with_fields(self, catalog: FieldCatalog) -> Self {
    // A fresh cell can't already be set
    let _ = self.fields.set(catalog);
    self
  }

  /// The custom field catalog, empty until loaded.
  pub fn fields(&self) -> &FieldCatalog {
    static EMPTY: OnceLock<FieldCatalog> = OnceLock::new();
    self
      .fields
      .get()
      .unwrap_or_else(|| EMPTY.get_or_init(FieldCatalog::default))
  }

  /// Load the custom field catalog with `load` unless it is already loaded.
  pub async fn load_fields<F, Fut, E>(&self, load: F) -> Result<&FieldCatalog, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<FieldCatalog, E>>,
  {
    self.fields.get_or_try_init(load).await
  }

  /// Badge color for a status: name override, then category, then fallback.
  pub fn status_color(&self, status_name: &str, category_color: &str) -> StatusColor {
    self
      .status_colors
      .get(status_name)
      .copied()
      .or_else(|| StatusColor::from_category(category_color))
      .unwrap_or(StatusColor::FALLBACK)
  }

  /// Browser link to an issue. Empty when the host is not a valid URL.
  pub fn issue_url(&self, issue_key: &str) -> String {
    Url::parse(&format!("{}/browse/{}", self.host, issue_key))
      .map(|url| url.to_string())
      .unwrap_or_default()
  }

  /// Browser link to a JQL search. Empty when the host is not a valid URL.
  pub fn search_url(&self, jql: &str) -> String {
    Url::parse(&format!("{}/issues/", self.host))
      .map(|mut url| {
        url.query_pairs_mut().append_pair("jql", jql);
        url.to_string()
      })
      .unwrap_or_default()
  }
}
