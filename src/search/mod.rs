//! The query block DSL and its column grammar.

pub mod column;
pub mod config;

pub use column::{ColumnSpec, FieldType, COMPACT_SYMBOL};
pub use config::{ParseContext, QueryConfig, ResultFormat};
