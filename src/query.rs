//! Page-addressable cache of issue search results.
//!
//! A `QueryCache` holds the pages fetched so far for one composite filter
//! (a fixed base filter plus an ad-hoc part). Pages are addressed by number
//! and fetched by offset, so any page can be loaded directly once the total
//! count is known. Changing the ad-hoc filter drops every cached page.
//!
//! # Example
//!
//! ```ignore
//! let mut cache = QueryCache::new(repository, "Assignee IN (currentUser())", 5);
//! cache.refresh(filters.compose()).await?;
//! cache.next_page().await?;
//! println!("{}", cache.page_info()); // "Items 6-10 of 23"
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filter::composite;
use crate::jira::{Issue, IssueRepository, UPDATED_DESC};

/// One fetched page of results.
#[derive(Debug, Clone)]
pub struct Page {
  /// 1-based
  pub number: usize,
  pub items: Vec<Issue>,
  pub total_count: Option<u64>,
}

pub struct QueryCache {
  repository: Arc<dyn IssueRepository>,
  base_filter: String,
  ad_hoc_filter: Option<String>,
  page_size: usize,
  pages: HashMap<usize, Page>,
  current_page: usize,
  total_count: Option<u64>,
  page_info: String,
}

impl QueryCache {
  pub fn new(
    repository: Arc<dyn IssueRepository>,
    base_filter: impl Into<String>,
    page_size: usize,
  ) -> Self {
    Self {
      repository,
      base_filter: base_filter.into(),
      ad_hoc_filter: None,
      page_size: page_size.max(1),
      pages: HashMap::new(),
      current_page: 1,
      total_count: None,
      page_info: "Loading...".to_string(),
    }
  }

  /// Drop all cached pages, switch to `ad_hoc_filter` and load page 1.
  ///
  /// Runs even when the filter is unchanged. If the fetch fails the previous
  /// pages, filter and position are kept.
  pub async fn refresh(&mut self, ad_hoc_filter: Option<String>) -> Result<(Vec<Issue>, Option<u64>)> {
    let query = composite(&self.base_filter, ad_hoc_filter.as_deref());
    let page = self.fetch(&query, 1).await?;

    self.pages.clear();
    self.ad_hoc_filter = ad_hoc_filter;
    self.total_count = page.total_count;
    let items = page.items.clone();
    self.pages.insert(1, page);
    self.show(1);

    Ok((items, self.total_count))
  }

  /// Make page `n` current, fetching it unless it is cached.
  pub async fn load_page(&mut self, n: usize) -> Result<Vec<Issue>> {
    if n < 1 {
      return Err(Error::validation("Page numbers start at 1"));
    }
    if let Some(total_pages) = self.total_pages() {
      if n > total_pages.max(1) {
        return Err(Error::validation(format!(
          "Page {} is beyond the last page ({})",
          n, total_pages
        )));
      }
    }

    if !self.pages.contains_key(&n) {
      let page = self.fetch(&self.query(), n).await?;
      if self.total_count.is_none() {
        self.total_count = page.total_count;
      }
      self.pages.insert(n, page);
    } else {
      debug!(page = n, "page served from cache");
    }

    self.show(n);
    Ok(self.items().to_vec())
  }

  pub async fn next_page(&mut self) -> Result<Vec<Issue>> {
    if !self.has_next_page() {
      return Err(Error::validation("Already on the last page"));
    }
    self.load_page(self.current_page + 1).await
  }

  pub async fn previous_page(&mut self) -> Result<Vec<Issue>> {
    if !self.has_previous_page() {
      return Err(Error::validation("Already on the first page"));
    }
    self.load_page(self.current_page - 1).await
  }

  async fn fetch(&self, query: &str, n: usize) -> Result<Page> {
    let offset = (n - 1) * self.page_size;
    debug!(page = n, offset, %query, "fetching page");

    let result = self
      .repository
      .search(query, self.page_size, UPDATED_DESC, offset)
      .await
      .map_err(|e| match e {
        Error::RemoteQuery(_) => e,
        other => Error::remote(other),
      })?;

    Ok(Page {
      number: n,
      items: result.items,
      total_count: result.total_count,
    })
  }

  fn show(&mut self, n: usize) {
    self.current_page = n;
    self.page_info = self.describe_range();
  }

  fn describe_range(&self) -> String {
    let count = self.items().len();
    if count == 0 {
      return "No items".to_string();
    }

    let first = (self.current_page - 1) * self.page_size + 1;
    let last = first + count - 1;
    let range = if first == last {
      format!("Item {}", first)
    } else {
      format!("Items {}-{}", first, last)
    };
    match self.total_count {
      Some(total) if (last as u64) < total => format!("{} of {}", range, total),
      _ => range,
    }
  }

  /// The full query string for the current filter set.
  pub fn query(&self) -> String {
    composite(&self.base_filter, self.ad_hoc_filter.as_deref())
  }

  pub fn ad_hoc_filter(&self) -> Option<&str> {
    self.ad_hoc_filter.as_deref()
  }

  /// Issues on the current page.
  pub fn items(&self) -> &[Issue] {
    self
      .pages
      .get(&self.current_page)
      .map(|p| p.items.as_slice())
      .unwrap_or(&[])
  }

  pub fn page(&self, n: usize) -> Option<&Page> {
    self.pages.get(&n)
  }

  pub fn cached_pages(&self) -> usize {
    self.pages.len()
  }

  pub fn current_page(&self) -> usize {
    self.current_page
  }

  /// Human readable range of the current page, e.g. "Items 1-5 of 12".
  pub fn page_info(&self) -> &str {
    &self.page_info
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  pub fn total_count(&self) -> Option<u64> {
    self.total_count
  }

  pub fn total_pages(&self) -> Option<usize> {
    self
      .total_count
      .map(|total| (total as usize).div_ceil(self.page_size))
  }

  pub fn has_next_page(&self) -> bool {
    match self.total_pages() {
      Some(total_pages) => self.current_page < total_pages,
      None => false,
    }
  }

  pub fn has_previous_page(&self) -> bool {
    self.current_page > 1
  }
}

impl std::fmt::Debug for QueryCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("base_filter", &self.base_filter)
      .field("ad_hoc_filter", &self.ad_hoc_filter)
      .field("page_size", &self.page_size)
      .field("current_page", &self.current_page)
      .field("total_count", &self.total_count)
      .finish_non_exhaustive()
  }
}
