//! The issue section: account, filters, the paged issue list and the selection.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::checkin::default_name::DefaultName;
use crate::checkin::IssueContext;
use crate::config::ListConfig;
use crate::error::{Error, Result};
use crate::filter::FilterState;
use crate::jira::{Credentials, Issue, IssueRepository, IssueType, MetadataCache};
use crate::notify::NotificationSink;
use crate::query::QueryCache;
use crate::settings::{SettingValue, SettingsStore};

pub const NOT_LOGGED_ON: &str = "Not Logged On";
pub const NOTHING_SELECTED: &str = "Nothing Selected";

const USER_NAME: &str = "UserName";
const PASSWORD: &str = "Password";
const SUBDOMAIN: &str = "Subdomain";

fn issue_types_setting(tenant: &str) -> String {
  format!("SelectedIssueTypes-{}", tenant)
}

fn issue_type_label(checked: usize) -> String {
  if checked == 0 {
    "Issue Types (all)".to_string()
  } else {
    format!("Issue Types ({})", checked)
  }
}

/// An issue type offered in the filter, with its checkbox state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTypeChoice {
  pub issue_type: IssueType,
  pub checked: bool,
}

/// The current page as shown to the user.
#[derive(Debug, Clone)]
pub struct PageView {
  pub items: Vec<Issue>,
  pub page_info: String,
  pub current_page: usize,
  pub total_pages: Option<usize>,
  pub has_next_page: bool,
  pub has_previous_page: bool,
}

#[derive(Debug)]
struct SectionState {
  display_name: String,
  tenant: Option<String>,
  issue_types: Vec<IssueTypeChoice>,
  filters: FilterState,
  issue_type_text: String,
  selected: Option<Issue>,
}

/// Decrements the busy count when dropped.
struct BusyGuard<'a>(&'a AtomicUsize);

impl Drop for BusyGuard<'_> {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

pub struct IssueSection {
  repository: Arc<dyn IssueRepository>,
  settings: Arc<dyn SettingsStore>,
  notifier: Arc<dyn NotificationSink>,
  metadata: Arc<MetadataCache>,
  list: ListConfig,
  state: Mutex<SectionState>,
  // None until logged on
  cache: tokio::sync::Mutex<Option<QueryCache>>,
  busy: AtomicUsize,
  default_name: Mutex<Option<Arc<DefaultName>>>,
}

impl IssueSection {
  pub fn new(
    repository: Arc<dyn IssueRepository>,
    settings: Arc<dyn SettingsStore>,
    notifier: Arc<dyn NotificationSink>,
    metadata: Arc<MetadataCache>,
    list: ListConfig,
  ) -> Self {
    Self {
      repository,
      settings,
      notifier,
      metadata,
      list,
      state: Mutex::new(SectionState {
        display_name: NOT_LOGGED_ON.to_string(),
        tenant: None,
        issue_types: Vec::new(),
        filters: FilterState::default(),
        issue_type_text: issue_type_label(0),
        selected: None,
      }),
      cache: tokio::sync::Mutex::new(None),
      busy: AtomicUsize::new(0),
      default_name: Mutex::new(None),
    }
  }

  fn state(&self) -> Result<std::sync::MutexGuard<'_, SectionState>> {
    self
      .state
      .lock()
      .map_err(|_| Error::Config("section state lock poisoned".to_string()))
  }

  fn busy(&self) -> BusyGuard<'_> {
    self.busy.fetch_add(1, Ordering::SeqCst);
    BusyGuard(&self.busy)
  }

  pub fn is_busy(&self) -> bool {
    self.busy.load(Ordering::SeqCst) > 0
  }

  // ==========================================================================
  // Account
  // ==========================================================================

  /// Log on with saved credentials, if there are any, and load the list.
  pub async fn initialize(&self) -> Result<()> {
    let _busy = self.busy();

    let credentials = Credentials {
      user_name: self.settings.get_string(USER_NAME)?.unwrap_or_default(),
      password: self.settings.get_string(PASSWORD)?.unwrap_or_default(),
      subdomain: self.settings.get_string(SUBDOMAIN)?.unwrap_or_default(),
    };

    if credentials.is_complete() {
      if let Err(e) = self.connect(&credentials).await {
        warn!(error = %e, "saved credentials rejected");
        self
          .notifier
          .error("Could not connect to Jira with saved credentials");
      }
    } else {
      debug!("no saved credentials");
    }

    self.refresh().await
  }

  /// Log on, remember the account and load the list. Returns the display name.
  pub async fn log_on(&self, credentials: &Credentials) -> Result<String> {
    if !credentials.is_complete() {
      return Err(Error::validation("Email and Password required"));
    }

    let display_name = self.connect(credentials).await?;

    self.settings.set(
      USER_NAME,
      SettingValue::Plain(credentials.user_name.clone()),
    )?;
    self.settings.set(
      PASSWORD,
      SettingValue::Encrypted(credentials.password.clone()),
    )?;
    self.settings.set(
      SUBDOMAIN,
      SettingValue::Encrypted(credentials.subdomain.clone()),
    )?;

    self.refresh().await?;
    Ok(display_name)
  }

  /// Log on without saving the account or loading the list.
  pub async fn connect(&self, credentials: &Credentials) -> Result<String> {
    let display_name = self
      .repository
      .authenticate(credentials)
      .await
      .map_err(|e| {
        warn!(error = %e, user = %credentials.user_name, "log on failed");
        Error::Auth("Could not connect to Jira.  Check credentials.".to_string())
      })?;

    let tenant = credentials.subdomain.trim();
    let metadata = self
      .metadata
      .get_or_fetch(tenant, || self.repository.fetch_metadata(tenant))
      .await?;
    self.repository.use_metadata(Arc::clone(&metadata));

    let saved = self
      .settings
      .get_multi(&issue_types_setting(tenant))?
      .unwrap_or_else(|| self.list.default_issue_types.clone());
    let choices: Vec<IssueTypeChoice> = metadata
      .issue_types
      .iter()
      .map(|issue_type| IssueTypeChoice {
        issue_type: issue_type.clone(),
        checked: saved.contains(&issue_type.name),
      })
      .collect();

    {
      let mut state = self.state()?;
      state.filters.issue_types = checked_names(&choices);
      state.issue_type_text = issue_type_label(state.filters.issue_types.len());
      state.issue_types = choices;
      state.display_name = display_name.clone();
      state.tenant = Some(tenant.to_string());
    }

    *self.cache.lock().await = Some(QueryCache::new(
      Arc::clone(&self.repository),
      self.list.base_filter.clone(),
      self.list.page_size,
    ));

    info!(user = %display_name, tenant, "logged on");
    Ok(display_name)
  }

  pub async fn log_out(&self) -> Result<()> {
    *self.cache.lock().await = None;
    let mut state = self.state()?;
    state.display_name = NOT_LOGGED_ON.to_string();
    state.tenant = None;
    info!("logged out");
    Ok(())
  }

  pub fn display_name(&self) -> String {
    self
      .state()
      .map(|s| s.display_name.clone())
      .unwrap_or_else(|_| NOT_LOGGED_ON.to_string())
  }

  pub fn is_logged_on(&self) -> bool {
    self.state().map(|s| s.tenant.is_some()).unwrap_or(false)
  }

  // ==========================================================================
  // Listing
  // ==========================================================================

  /// Reload page 1 under the current filters and re-check the selection.
  pub async fn refresh(&self) -> Result<()> {
    let _busy = self.busy();
    let items = self.reload_list().await?;
    self.recheck_selection(items).await
  }

  /// Page 1 under the current filters, or `None` when not logged on.
  async fn reload_list(&self) -> Result<Option<Vec<Issue>>> {
    let ad_hoc = self.state()?.filters.compose();
    let mut cache = self.cache.lock().await;
    let Some(cache) = cache.as_mut() else {
      debug!("not logged on, refresh skipped");
      return Ok(None);
    };
    let (items, total) = cache.refresh(ad_hoc).await?;
    info!(total = ?total, "issues refreshed");
    Ok(Some(items))
  }

  async fn recheck_selection(&self, items: Option<Vec<Issue>>) -> Result<()> {
    let (Some(items), Some(selected)) = (items, self.selected()) else {
      return Ok(());
    };
    let fresh = match items.into_iter().find(|i| i.key == selected.key) {
      Some(issue) => Some(issue),
      None => self
        .repository
        .fetch_by_key(&selected.key)
        .await?
        .into_iter()
        .next(),
    };

    match fresh {
      Some(issue) => self.state()?.selected = Some(issue),
      None => {
        self.notifier.error(&format!(
          "Previously selected Issue ({}) could not be found",
          selected.key
        ));
        self.clear_selection();
      }
    }
    Ok(())
  }

  pub async fn load_page(&self, n: usize) -> Result<Vec<Issue>> {
    let mut cache = self.cache.lock().await;
    logged_on(&mut cache)?.load_page(n).await
  }

  pub async fn next_page(&self) -> Result<Vec<Issue>> {
    let mut cache = self.cache.lock().await;
    logged_on(&mut cache)?.next_page().await
  }

  pub async fn previous_page(&self) -> Result<Vec<Issue>> {
    let mut cache = self.cache.lock().await;
    logged_on(&mut cache)?.previous_page().await
  }

  /// The current page, or `None` before logging on.
  pub async fn page_view(&self) -> Option<PageView> {
    let cache = self.cache.lock().await;
    cache.as_ref().map(|cache| PageView {
      items: cache.items().to_vec(),
      page_info: cache.page_info().to_string(),
      current_page: cache.current_page(),
      total_pages: cache.total_pages(),
      has_next_page: cache.has_next_page(),
      has_previous_page: cache.has_previous_page(),
    })
  }

  // ==========================================================================
  // Filters
  // ==========================================================================

  pub fn filters(&self) -> FilterState {
    self.state().map(|s| s.filters.clone()).unwrap_or_default()
  }

  /// Apply `change`; any change to the filter state refreshes the list,
  /// even when the composed query comes out the same.
  ///
  /// A failed reload puts the previous filters and issue type checkboxes
  /// back. Issue types are saved for the tenant only once the reload worked.
  async fn update_filters(&self, change: impl FnOnce(&mut FilterState)) -> Result<bool> {
    let before = {
      let mut state = self.state()?;
      let before = state.filters.clone();
      change(&mut state.filters);
      if state.filters == before {
        return Ok(false);
      }
      if state.filters.issue_types != before.issue_types {
        let names = state.filters.issue_types.clone();
        show_issue_types(&mut state, &names);
      }
      before
    };

    let _busy = self.busy();
    let items = match self.reload_list().await {
      Ok(items) => items,
      Err(e) => {
        let mut state = self.state()?;
        show_issue_types(&mut state, &before.issue_types);
        state.filters = before;
        return Err(e);
      }
    };

    let applied = self.filters().issue_types;
    if applied != before.issue_types {
      self.save_issue_types(applied)?;
    }
    self.recheck_selection(items).await?;
    Ok(true)
  }

  fn save_issue_types(&self, names: Vec<String>) -> Result<()> {
    let Some(tenant) = self.state()?.tenant.clone() else {
      return Ok(());
    };
    self
      .settings
      .set(&issue_types_setting(&tenant), SettingValue::Multi(names))
  }

  pub async fn toggle_filter(&self) -> Result<bool> {
    self
      .update_filters(|f| f.filter_active = !f.filter_active)
      .await
  }

  pub async fn set_exclude_done(&self, exclude: bool) -> Result<bool> {
    self.update_filters(|f| f.exclude_done = exclude).await
  }

  pub async fn set_summary_filter(&self, summary: &str) -> Result<bool> {
    let summary = summary.to_string();
    self.update_filters(|f| f.summary = summary).await
  }

  /// Replace the whole filter state, issue types included, with at most one
  /// reload. Every issue type named must be offered by the tenant.
  pub async fn apply_filters(&self, filters: FilterState) -> Result<bool> {
    {
      let state = self.state()?;
      let unknown = filters
        .issue_types
        .iter()
        .find(|name| !state.issue_types.iter().any(|c| &c.issue_type.name == *name));
      if let Some(name) = unknown {
        return Err(Error::validation(format!("Unknown issue type: {}", name)));
      }
    }
    self.update_filters(|f| *f = filters).await
  }

  /// Check or uncheck an issue type; takes effect on [`Self::apply_issue_types`].
  pub fn set_issue_type_checked(&self, name: &str, checked: bool) -> Result<()> {
    let mut state = self.state()?;
    let choice = state
      .issue_types
      .iter_mut()
      .find(|c| c.issue_type.name == name)
      .ok_or_else(|| Error::validation(format!("Unknown issue type: {}", name)))?;
    choice.checked = checked;
    Ok(())
  }

  /// Use the checked issue types, refresh and save them for the tenant.
  /// Refreshes even when the checked set is the one already applied.
  pub async fn apply_issue_types(&self) -> Result<()> {
    let selected = checked_names(&self.state()?.issue_types);
    if self
      .update_filters(|f| f.issue_types = selected.clone())
      .await?
    {
      return Ok(());
    }

    self.refresh().await?;
    self.save_issue_types(selected)
  }

  pub fn issue_types(&self) -> Vec<IssueTypeChoice> {
    self.state().map(|s| s.issue_types.clone()).unwrap_or_default()
  }

  pub fn issue_type_text(&self) -> String {
    self
      .state()
      .map(|s| s.issue_type_text.clone())
      .unwrap_or_else(|_| issue_type_label(0))
  }

  // ==========================================================================
  // Selection
  // ==========================================================================

  /// Jump to an issue by key. Returns false when no such issue exists.
  pub async fn add_by_key(&self, key: &str) -> Result<bool> {
    let key = key.trim();
    if key.is_empty() {
      return Err(Error::validation("Please enter the Issue Key"));
    }

    let Some(issue) = self.repository.fetch_by_key(key).await?.into_iter().next() else {
      debug!(key, "issue not found");
      return Ok(false);
    };

    if issue.assignee.as_deref() != Some(self.display_name().as_str()) {
      self
        .notifier
        .error("Warning: You are not the Assignee of the current Issue");
    }
    self.select(issue);
    Ok(true)
  }

  /// Make `issue` the issue the next check-in is associated with.
  pub fn select(&self, issue: Issue) {
    debug!(key = %issue.key, "issue selected");
    self.set_selected(Some(issue));
  }

  fn set_selected(&self, issue: Option<Issue>) {
    if let Ok(mut state) = self.state() {
      state.selected = issue.clone();
    }
    let default_name = self.default_name.lock().ok().and_then(|d| d.clone());
    if let Some(default_name) = default_name {
      default_name.update(issue.as_ref());
    }
  }

  pub fn selected(&self) -> Option<Issue> {
    self.state().ok().and_then(|s| s.selected.clone())
  }

  pub fn clear_selection(&self) {
    self.set_selected(None);
  }

  /// `"Nothing Selected"` or `"KEY: Summary"`.
  pub fn selection_title(&self) -> String {
    self
      .selected()
      .map_or_else(|| NOTHING_SELECTED.to_string(), |i| i.display_name())
  }

  /// Keep `default_name` in step with the selection from now on.
  pub fn attach_default_name(&self, default_name: Arc<DefaultName>) {
    if let Ok(mut slot) = self.default_name.lock() {
      *slot = Some(default_name);
    }
  }
}

fn logged_on(cache: &mut Option<QueryCache>) -> Result<&mut QueryCache> {
  cache
    .as_mut()
    .ok_or_else(|| Error::Auth("Not logged on".to_string()))
}

fn show_issue_types(state: &mut SectionState, names: &[String]) {
  for choice in state.issue_types.iter_mut() {
    choice.checked = names.contains(&choice.issue_type.name);
  }
  state.issue_type_text = issue_type_label(names.len());
}

fn checked_names(choices: &[IssueTypeChoice]) -> Vec<String> {
  choices
    .iter()
    .filter(|c| c.checked)
    .map(|c| c.issue_type.name.clone())
    .collect()
}

#[async_trait]
impl IssueContext for IssueSection {
  fn selected(&self) -> Option<Issue> {
    IssueSection::selected(self)
  }

  fn clear_selection(&self) {
    IssueSection::clear_selection(self)
  }

  async fn refresh(&self) -> Result<()> {
    IssueSection::refresh(self).await
  }
}
