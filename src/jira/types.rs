use std::collections::BTreeMap;
use url::Url;

/// Description given to an issue type whose name is defined by more than one project.
pub const SHARED_ISSUE_TYPE_DESCRIPTION: &str = "(Issue Type exists in multiple projects)";

/// An issue as returned by search; never modified after it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
  pub key: String,
  pub summary: String,
  pub status: String,
  pub status_category: String,
  pub parent_key: Option<String>,
  pub parent_summary: Option<String>,
  pub parent_type: Option<String>,
  /// Joined version names, or "None"
  pub fix_versions: String,
  /// Joined sprint names, or "None"
  pub sprint: String,
  pub assignee: Option<String>,
  /// Tenant root, e.g. `https://acme.atlassian.net/`
  pub base_url: Url,
}

impl Issue {
  /// Browse link for this issue.
  pub fn detail_url(&self) -> String {
    browse_url(&self.base_url, &self.key)
  }

  /// Browse link for the parent issue, if there is one.
  pub fn parent_detail_url(&self) -> Option<String> {
    self
      .parent_key
      .as_deref()
      .map(|key| browse_url(&self.base_url, key))
  }

  /// Default shelveset name for this issue.
  pub fn display_name(&self) -> String {
    format!("{}: {}", self.key, self.summary)
  }
}

fn browse_url(base: &Url, key: &str) -> String {
  format!("{}browse/{}", base, key)
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
  pub items: Vec<Issue>,
  pub total_count: Option<u64>,
}

/// An issue type known to the tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueType {
  pub name: String,
  pub description: String,
}

/// Per-tenant metadata needed to read issues and build filters.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
  /// Custom field id holding sprint membership (e.g. "customfield_10020")
  pub sprint_field: Option<String>,
  pub issue_types: Vec<IssueType>,
}

impl Metadata {
  /// Build metadata, merging issue types that share a name and sorting by name.
  pub fn new(sprint_field: Option<String>, issue_types: Vec<IssueType>) -> Self {
    let mut by_name: BTreeMap<String, IssueType> = BTreeMap::new();
    for issue_type in issue_types {
      match by_name.get_mut(&issue_type.name) {
        Some(existing) => existing.description = SHARED_ISSUE_TYPE_DESCRIPTION.to_string(),
        None => {
          by_name.insert(issue_type.name.clone(), issue_type);
        }
      }
    }

    Self {
      sprint_field,
      issue_types: by_name.into_values().collect(),
    }
  }
}

/// Account used to log on to a tenant.
#[derive(Clone)]
pub struct Credentials {
  pub user_name: String,
  pub password: String,
  /// Tenant subdomain, e.g. "acme" for acme.atlassian.net
  pub subdomain: String,
}

impl Credentials {
  pub fn is_complete(&self) -> bool {
    ![&self.user_name, &self.password, &self.subdomain]
      .iter()
      .any(|v| v.trim().is_empty())
  }
}

impl std::fmt::Debug for Credentials {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Credentials")
      .field("user_name", &self.user_name)
      .field("subdomain", &self.subdomain)
      .finish_non_exhaustive()
  }
}
