pub mod account;
pub mod api_types;
pub mod client;
pub mod service;
pub mod types;

pub use account::{Account, FieldCatalog, StatusColor};
pub use client::{JiraApi, JiraClient};
pub use service::{Caches, JiraService};
pub use types::{Issue, SearchResults};
