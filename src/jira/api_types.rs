//! Serde-deserializable types matching Jira API responses.
//!
//! These types are separate from domain types: every field is optional here,
//! and the conversions below decide which ones are required, failing with
//! [`Error::Parse`] naming the missing field.

use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use crate::error::{Error, Result};

use super::types::{Issue, IssueType, Metadata};

// ============================================================================
// Common nested field types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiStatusCategory {
  pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
  pub name: Option<String>,
  #[serde(rename = "statusCategory")]
  pub status_category: Option<ApiStatusCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ApiNamed {
  pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  #[serde(rename = "displayName")]
  pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiParentFields {
  pub summary: Option<String>,
  #[serde(rename = "issuetype")]
  pub issue_type: Option<ApiNamed>,
}

#[derive(Debug, Deserialize)]
pub struct ApiParent {
  pub key: Option<String>,
  #[serde(default)]
  pub fields: ApiParentFields,
}

// ============================================================================
// Issues and search
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiIssueFields {
  pub summary: Option<String>,
  pub status: Option<ApiStatus>,
  pub parent: Option<ApiParent>,
  #[serde(rename = "fixVersions", default)]
  pub fix_versions: Option<Vec<ApiNamed>>,
  pub assignee: Option<ApiUser>,
  // Catch-all for custom fields (like sprint)
  #[serde(flatten)]
  pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub key: Option<String>,
  #[serde(rename = "self")]
  pub self_link: Option<String>,
  pub fields: Option<ApiIssueFields>,
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  pub issues: Option<Vec<ApiIssue>>,
  pub total: Option<u64>,
}

// ============================================================================
// Account and metadata endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiMyself {
  #[serde(rename = "displayName")]
  pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiField {
  pub key: Option<String>,
  pub id: Option<String>,
  pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssueType {
  pub name: Option<String>,
  pub description: Option<String>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

fn required<T>(value: Option<T>, entity: &'static str, field: &'static str) -> Result<T> {
  value.ok_or(Error::Parse { entity, field })
}

impl ApiIssue {
  pub fn into_issue(self, sprint_field: Option<&str>) -> Result<Issue> {
    let key = required(self.key, "issue", "key")?;
    let self_link = required(self.self_link, "issue", "self")?;
    let fields = required(self.fields, "issue", "fields")?;
    let summary = required(fields.summary, "issue", "fields.summary")?;
    let status = required(fields.status, "issue", "fields.status")?;
    let status_name = required(status.name, "issue", "fields.status.name")?;
    let status_category = required(
      status.status_category.and_then(|c| c.name),
      "issue",
      "fields.status.statusCategory",
    )?;

    let sprint = sprint_field
      .and_then(|name| fields.extra.get(name))
      .map(extract_sprint_names)
      .unwrap_or_default();

    let (parent_key, parent_summary, parent_type) = match fields.parent {
      Some(p) => (
        p.key,
        p.fields.summary,
        p.fields.issue_type.and_then(|t| t.name),
      ),
      None => (None, None, None),
    };

    Ok(Issue {
      key,
      summary,
      status: status_name,
      status_category,
      parent_key,
      parent_summary,
      parent_type,
      fix_versions: join_or_none(
        fields
          .fix_versions
          .unwrap_or_default()
          .into_iter()
          .filter_map(|v| v.name),
      ),
      sprint: join_or_none(sprint.into_iter()),
      assignee: fields.assignee.and_then(|u| u.display_name),
      base_url: tenant_root(&self_link)?,
    })
  }
}

impl ApiSearchResponse {
  pub fn into_issues(self, sprint_field: Option<&str>) -> Result<(Vec<Issue>, Option<u64>)> {
    let issues = required(self.issues, "search response", "issues")?
      .into_iter()
      .map(|issue| issue.into_issue(sprint_field))
      .collect::<Result<Vec<_>>>()?;
    Ok((issues, self.total))
  }
}

impl ApiMyself {
  pub fn into_display_name(self) -> Result<String> {
    required(self.display_name, "account", "displayName")
  }
}

/// Build tenant metadata from the field and issue type listings.
pub fn metadata_from_api(fields: Vec<ApiField>, issue_types: Vec<ApiIssueType>) -> Result<Metadata> {
  let sprint_field = fields
    .into_iter()
    .find(|f| f.name.as_deref() == Some("Sprint"))
    .and_then(|f| f.key.or(f.id));

  let issue_types = issue_types
    .into_iter()
    .map(|t| {
      Ok(IssueType {
        name: required(t.name, "issue type", "name")?,
        description: t.description.unwrap_or_default(),
      })
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(Metadata::new(sprint_field, issue_types))
}

// ============================================================================
// Helpers
// ============================================================================

fn join_or_none(values: impl Iterator<Item = String>) -> String {
  let joined = values.collect::<Vec<_>>().join(", ");
  if joined.is_empty() {
    "None".to_string()
  } else {
    joined
  }
}

/// Sprint fields hold an array of sprint objects, each with a "name"
fn extract_sprint_names(value: &serde_json::Value) -> Vec<String> {
  value
    .as_array()
    .map(|sprints| {
      sprints
        .iter()
        .filter_map(|s| s.get("name").and_then(|n| n.as_str()))
        .map(String::from)
        .collect()
    })
    .unwrap_or_default()
}

/// Scheme and authority of an API link, e.g. `https://acme.atlassian.net/`
fn tenant_root(link: &str) -> Result<Url> {
  let mut url = Url::parse(link).map_err(|_| Error::Parse {
    entity: "issue",
    field: "self",
  })?;
  url.set_path("/");
  url.set_query(None);
  url.set_fragment(None);
  Ok(url)
}
