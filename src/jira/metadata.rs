//! Per-tenant metadata memoization.
//!
//! Metadata (the sprint field id and the issue type list) is fetched the first
//! time a tenant is seen and kept for the rest of the process. Entries never
//! expire; logging on to the same tenant again reuses the stored value.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

use super::types::Metadata;

#[derive(Default)]
pub struct MetadataCache {
  // Held across the fetch so concurrent first lookups for a tenant fetch once
  entries: Mutex<HashMap<String, Arc<Metadata>>>,
}

static GLOBAL: OnceLock<Arc<MetadataCache>> = OnceLock::new();

impl MetadataCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// The process instance, shared by every section.
  pub fn global() -> Arc<MetadataCache> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(MetadataCache::new())))
  }

  /// Return the tenant's metadata, calling `fetch` only if it was never stored.
  ///
  /// A failed fetch stores nothing, so the next caller tries again.
  pub async fn get_or_fetch<F, Fut>(&self, tenant: &str, fetch: F) -> Result<Arc<Metadata>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Metadata>>,
  {
    let mut entries = self.entries.lock().await;
    if let Some(metadata) = entries.get(tenant) {
      return Ok(Arc::clone(metadata));
    }

    debug!(tenant, "fetching tenant metadata");
    let metadata = Arc::new(fetch().await?);
    entries.insert(tenant.to_string(), Arc::clone(&metadata));
    Ok(metadata)
  }

  pub async fn contains(&self, tenant: &str) -> bool {
    self.entries.lock().await.contains_key(tenant)
  }
}
