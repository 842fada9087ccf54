//! Render Jira searches, counts and issues inside Markdown notes.

pub mod app;
pub mod cache;
pub mod cell;
pub mod config;
pub mod duration;
pub mod error;
pub mod inline;
pub mod jira;
pub mod logging;
pub mod notes;
pub mod render;
pub mod search;
