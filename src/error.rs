//! Error types surfaced to the user in place of rendered output.
//!
//! Messages are shown verbatim in the rendered error block, so their wording
//! is part of the user interface.

use thiserror::Error;

use crate::search::column::COMPACT_SYMBOL;

/// Errors raised while parsing a query block or a column token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
  #[error("Invalid key: {0}")]
  InvalidKey(String),

  #[error("Invalid type: {0}")]
  InvalidType(String),

  #[error("Invalid limit: {0}")]
  InvalidLimit(String),

  #[error("Invalid column: {0}")]
  InvalidColumn(String),

  #[error("Please replace the symbol \"#\" with \"{}\" to use the compact format", COMPACT_SYMBOL)]
  DeprecatedCompactMarker,

  #[error("Custom field {0} not found")]
  UnknownCustomField(String),

  #[error("Type LIST and custom columns are not compatible options")]
  IncompatibleOptions,
}

impl QueryError {
  /// True for every error that belongs to the column grammar.
  pub fn is_column_error(&self) -> bool {
    matches!(
      self,
      Self::InvalidColumn(_) | Self::DeprecatedCompactMarker | Self::UnknownCustomField(_)
    )
  }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DurationError {
  #[error("Invalid duration: {0}")]
  InvalidDuration(String),
}

/// Errors raised while resolving a single table cell.
///
/// These are recoverable: the renderer replaces the cell with a placeholder
/// and keeps rendering the rest of the row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CellError {
  #[error("Custom field {0} not found")]
  UnknownCustomField(String),

  #[error("Invalid note pattern: {0}")]
  InvalidNotePattern(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_messages_are_user_facing() {
    assert_eq!(QueryError::InvalidKey("foo".into()).to_string(), "Invalid key: foo");
    assert_eq!(
      QueryError::IncompatibleOptions.to_string(),
      "Type LIST and custom columns are not compatible options"
    );
    assert_eq!(
      QueryError::DeprecatedCompactMarker.to_string(),
      "Please replace the symbol \"#\" with \"-\" to use the compact format"
    );
  }

  #[test]
  fn test_deprecated_marker_is_a_column_error() {
    assert!(QueryError::DeprecatedCompactMarker.is_column_error());
    assert!(!QueryError::InvalidLimit("x".into()).is_column_error());
  }
}
