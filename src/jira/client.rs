use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::JiraConfig;
use crate::error::{Error, Result};
use crate::jira::api_types::{
  metadata_from_api, ApiField, ApiIssueType, ApiMyself, ApiSearchResponse,
};
use crate::jira::repository::IssueRepository;
use crate::jira::types::{Credentials, Metadata, SearchPage};

/// Logged-on connection to one tenant
#[derive(Clone)]
struct Session {
  client: gouqi::r#async::Jira,
  base: Url,
  user_name: String,
  password: String,
}

/// Jira Cloud API client wrapper
pub struct JiraClient {
  /// Overrides `https://{subdomain}.atlassian.net/` when set
  url_override: Option<String>,
  http: reqwest::Client,
  session: RwLock<Option<Session>>,
  metadata: RwLock<Option<Arc<Metadata>>>,
}

impl JiraClient {
  pub fn new(config: &JiraConfig) -> Self {
    Self {
      url_override: config.url.clone(),
      http: reqwest::Client::new(),
      session: RwLock::new(None),
      metadata: RwLock::new(None),
    }
  }

  fn tenant_url(&self, subdomain: &str) -> Result<Url> {
    let raw = match &self.url_override {
      Some(url) => url.clone(),
      None => format!("https://{}.atlassian.net/", subdomain),
    };
    let mut url = Url::parse(&raw).map_err(|e| Error::Config(format!("invalid Jira URL {}: {}", raw, e)))?;
    if !url.path().ends_with('/') {
      let path = format!("{}/", url.path());
      url.set_path(&path);
    }
    Ok(url)
  }

  fn session(&self) -> Result<Session> {
    self
      .session
      .read()
      .map_err(|_| Error::Auth("session lock poisoned".to_string()))?
      .clone()
      .ok_or_else(|| Error::Auth("Not logged on to Jira".to_string()))
  }

  fn sprint_field(&self) -> Option<String> {
    self
      .metadata
      .read()
      .ok()
      .and_then(|m| m.as_ref().and_then(|m| m.sprint_field.clone()))
  }
}

#[async_trait]
impl IssueRepository for JiraClient {
  async fn authenticate(&self, credentials: &Credentials) -> Result<String> {
    let base = self.tenant_url(&credentials.subdomain)?;
    let gouqi_credentials =
      gouqi::Credentials::Basic(credentials.user_name.clone(), credentials.password.clone());

    let client = gouqi::r#async::Jira::new(base.as_str(), gouqi_credentials)
      .map_err(|e| Error::Auth(format!("Failed to create Jira client: {}", e)))?;

    let myself: ApiMyself = client
      .get("api", "/myself")
      .await
      .map_err(|e| Error::Auth(format!("Failed to log on to {}: {}", base, e)))?;
    let display_name = myself.into_display_name()?;

    info!(tenant = %credentials.subdomain, user = %display_name, "logged on");

    let session = Session {
      client,
      base,
      user_name: credentials.user_name.clone(),
      password: credentials.password.clone(),
    };
    *self
      .session
      .write()
      .map_err(|_| Error::Auth("session lock poisoned".to_string()))? = Some(session);

    Ok(display_name)
  }

  async fn fetch_metadata(&self, tenant: &str) -> Result<Metadata> {
    let session = self.session()?;

    let fields = session.client.get::<Vec<ApiField>>("api", "/field");
    let issue_types = session.client.get::<Vec<ApiIssueType>>("api", "/issuetype");
    let (fields, issue_types) = futures::try_join!(fields, issue_types)
      .map_err(|e| Error::remote(format!("Failed to load metadata for {}: {}", tenant, e)))?;

    metadata_from_api(fields, issue_types)
  }

  fn use_metadata(&self, metadata: Arc<Metadata>) {
    if let Ok(mut slot) = self.metadata.write() {
      *slot = Some(metadata);
    }
  }

  async fn search(
    &self,
    query: &str,
    page_size: usize,
    sort_order: &str,
    offset: usize,
  ) -> Result<SearchPage> {
    let session = self.session()?;

    let jql = format!("{} order by {}", query, sort_order);
    let encoded: String = url::form_urlencoded::byte_serialize(jql.as_bytes()).collect();
    let endpoint = format!(
      "/search?jql={}&maxResults={}&startAt={}",
      encoded, page_size, offset
    );
    debug!(%jql, page_size, offset, "searching issues");

    let response: ApiSearchResponse = session
      .client
      .get("api", &endpoint)
      .await
      .map_err(|e| Error::remote(format!("Failed to search issues: {}", e)))?;

    let (items, total_count) = response.into_issues(self.sprint_field().as_deref())?;
    Ok(SearchPage { items, total_count })
  }

  async fn add_comment(&self, issue_key: &str, body: &Value) -> Result<bool> {
    let session = self.session()?;

    // The document format is only accepted by the v3 API
    let url = session
      .base
      .join(&format!("rest/api/3/issue/{}/comment", issue_key))
      .map_err(|e| Error::remote(format!("Invalid comment URL: {}", e)))?;
    let payload = serde_json::to_vec(&serde_json::json!({ "body": body }))
      .map_err(|e| Error::remote(format!("Failed to encode comment: {}", e)))?;

    let response = self
      .http
      .post(url)
      .basic_auth(&session.user_name, Some(&session.password))
      .header(reqwest::header::CONTENT_TYPE, "application/json")
      .body(payload)
      .send()
      .await
      .map_err(|e| Error::remote(format!("Error creating Jira Comment: {}", e)))?;

    if let Err(e) = response.error_for_status_ref() {
      warn!(issue = issue_key, error = %e, "comment rejected");
      return Err(Error::remote(format!("Error creating Jira Comment: {}", e)));
    }

    info!(issue = issue_key, "comment added");
    Ok(true)
  }
}
