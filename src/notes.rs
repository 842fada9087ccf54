//! Markdown notes attached to issues.
//!
//! A note belongs to an issue when its file name starts with the issue key
//! followed by anything but a digit, so `X-1 login.md` belongs to `X-1` and
//! `X-12.md` does not.

use color_eyre::{eyre::eyre, Result};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A note file and its parsed front matter.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
  /// Path relative to the notes root, `/` separated
  pub path: String,
  /// Front matter as a tree, `Null` when the note has none
  pub front_matter: Value,
}

impl Note {
  pub fn new(path: impl Into<String>, front_matter: Value) -> Self {
    Self {
      path: path.into(),
      front_matter,
    }
  }

  /// File name with extension.
  pub fn name(&self) -> &str {
    self.path.rsplit('/').next().unwrap_or(&self.path)
  }

  /// File name without its last extension.
  pub fn stem(&self) -> &str {
    let name = self.name();
    match name.rfind('.') {
      Some(dot) => &name[..dot],
      None => name,
    }
  }

  /// Front matter values at a dot-separated path, stringified.
  pub fn front_matter_values(&self, path: &str) -> Vec<String> {
    lookup_path(&self.front_matter, path)
      .map(|value| match value {
        Value::String(s) => vec![s.clone()],
        Value::Null => Vec::new(),
        other => vec![other.to_string()],
      })
      .unwrap_or_default()
  }
}

/// Matches the file names of notes belonging to one issue.
#[derive(Debug, Clone)]
pub struct NoteMatcher {
  pattern: Regex,
}

impl NoteMatcher {
  pub fn new(issue_key: &str) -> Result<Self, regex::Error> {
    let pattern = Regex::new(&format!("^{}[^0-9]", regex::escape(issue_key)))?;
    Ok(Self { pattern })
  }

  pub fn is_match(&self, note: &Note) -> bool {
    self.pattern.is_match(note.name())
  }

  pub fn filter<'a>(&self, notes: &'a [Note]) -> Vec<&'a Note> {
    notes.iter().filter(|note| self.is_match(note)).collect()
  }
}

/// Where a new note for `issue_key` is created.
pub fn new_note_path(folder: &str, issue_key: &str) -> String {
  format!("{}/{}.md", folder, issue_key)
}

/// Walk a dot-separated path; numeric segments index into lists.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  path
    .split('.')
    .filter(|segment| !segment.is_empty())
    .try_fold(value, |current, segment| match current {
      Value::Object(map) => map.get(segment),
      Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
      _ => None,
    })
}

/// Front matter block of a Markdown document, `Null` if there is none or it
/// doesn't parse.
pub fn parse_front_matter(contents: &str) -> Value {
  let Some(rest) = contents
    .strip_prefix("---\n")
    .or_else(|| contents.strip_prefix("---\r\n"))
  else {
    return Value::Null;
  };

  let mut offset = 0;
  for line in rest.split_inclusive('\n') {
    if line.trim_end() == "---" {
      return serde_yaml::from_str(&rest[..offset]).unwrap_or(Value::Null);
    }
    offset += line.len();
  }
  Value::Null
}

/// Every Markdown note under `root`, recursively.
///
/// Only a missing or unreadable root is an error. Entries that can't be
/// walked or read are skipped with a warning, and notes that aren't valid
/// UTF-8 are decoded lossily.
pub fn scan_notes(root: &Path) -> Result<Vec<Note>> {
  if !root.is_dir() {
    return Err(eyre!("Notes folder {} is not a directory", root.display()));
  }

  let mut notes = Vec::new();
  for entry in WalkDir::new(root).follow_links(true).into_iter() {
    let entry = match entry {
      Ok(entry) => entry,
      Err(e) => {
        warn!(error = %e, "skipping unreadable notes entry");
        continue;
      }
    };
    let path = entry.path();
    if !entry.file_type().is_file() || !is_markdown_file(path) {
      continue;
    }

    let bytes = match std::fs::read(path) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "skipping unreadable note");
        continue;
      }
    };
    let contents = String::from_utf8_lossy(&bytes);
    notes.push(Note::new(relative_path(root, path), parse_front_matter(&contents)));
  }

  notes.sort_by(|a, b| a.path.cmp(&b.path));
  debug!(root = %root.display(), count = notes.len(), "scanned notes");
  Ok(notes)
}

fn is_markdown_file(path: &Path) -> bool {
  path.extension().is_some_and(|ext| ext == "md")
}

fn relative_path(root: &Path, path: &Path) -> String {
  let relative = path.strip_prefix(root).unwrap_or(path);
  let components: Vec<String> = relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();
  components.join("/")
}
