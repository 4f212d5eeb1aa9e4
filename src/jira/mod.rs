//! Jira data model, API client and repository boundary.

pub mod api_types;
mod client;
mod metadata;
mod repository;
mod types;

pub use client::JiraClient;
pub use metadata::MetadataCache;
pub use repository::{IssueRepository, UPDATED_DESC};
pub use types::{Credentials, Issue, IssueType, Metadata, SearchPage, SHARED_ISSUE_TYPE_DESCRIPTION};

#[cfg(test)]
pub use repository::testing;
