//! The issue repository boundary.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;

use super::types::{Credentials, Issue, Metadata, SearchPage};

/// Sort order used for every paged search.
pub const UPDATED_DESC: &str = "updated desc";

/// Remote issue tracker operations the workflow depends on.
#[async_trait]
pub trait IssueRepository: Send + Sync {
  /// Log on and return the account's display name.
  async fn authenticate(&self, credentials: &Credentials) -> Result<String>;

  /// Fetch field and issue type metadata for a tenant.
  ///
  /// Callers go through [`super::MetadataCache`] so this runs once per tenant.
  async fn fetch_metadata(&self, tenant: &str) -> Result<Metadata>;

  /// Hand the repository the tenant metadata to use when reading issues.
  fn use_metadata(&self, _metadata: Arc<Metadata>) {}

  async fn search(
    &self,
    query: &str,
    page_size: usize,
    sort_order: &str,
    offset: usize,
  ) -> Result<SearchPage>;

  /// Look up a single issue by key ("jump to issue").
  async fn fetch_by_key(&self, key: &str) -> Result<Vec<Issue>> {
    let page = self
      .search(&format!("Key IN ({})", key), 1, "Key", 0)
      .await?;
    Ok(page.items)
  }

  /// Add a structured (document format) comment to an issue.
  async fn add_comment(&self, issue_key: &str, body: &Value) -> Result<bool>;
}
