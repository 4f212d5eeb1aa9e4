use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub jira: JiraConfig,
  #[serde(default)]
  pub list: ListConfig,
  #[serde(default)]
  pub vcs: VcsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  /// Tenant subdomain, e.g. "acme" for acme.atlassian.net
  pub subdomain: String,
  pub email: String,
  /// Full base URL, for tenants not hosted under atlassian.net
  pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
  #[serde(default = "default_page_size")]
  pub page_size: usize,
  /// Filter every listing is restricted to
  #[serde(default = "default_base_filter")]
  pub base_filter: String,
  /// Issue types checked when a tenant has no saved selection
  #[serde(default = "default_issue_types")]
  pub default_issue_types: Vec<String>,
}

impl Default for ListConfig {
  fn default() -> Self {
    Self {
      page_size: default_page_size(),
      base_filter: default_base_filter(),
      default_issue_types: default_issue_types(),
    }
  }
}

fn default_page_size() -> usize {
  5
}

fn default_base_filter() -> String {
  "Assignee IN (currentUser())".to_string()
}

fn default_issue_types() -> Vec<String> {
  vec!["Sub-task".to_string()]
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VcsConfig {
  /// Changeset link with an `{id}` placeholder
  pub changeset_url: Option<String>,
}

impl VcsConfig {
  pub fn changeset_url(&self, id: i64) -> String {
    self
      .changeset_url
      .as_deref()
      .map(|template| template.replace("{id}", &id.to_string()))
      .unwrap_or_default()
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jira-checkin.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jira-checkin/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/jira-checkin/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jira-checkin.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jira-checkin").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JIRA_CHECKIN_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JIRA_CHECKIN_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        eyre!(
          "Jira API token not found. Set JIRA_CHECKIN_TOKEN or JIRA_API_TOKEN environment variable."
        )
      })
  }
}
