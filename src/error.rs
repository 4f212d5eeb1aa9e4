//! Error kinds shared by the paging cache, the check-in workflow and the
//! collaborator boundaries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Local precondition failed (empty comment, blank key, page out of range).
  /// State is left unchanged.
  #[error("{0}")]
  Validation(String),

  /// Search, metadata or comment call failed at the remote boundary.
  #[error("remote query failed: {0}")]
  RemoteQuery(String),

  /// Authentication failed, or the repository was used before logging on.
  #[error("{0}")]
  Auth(String),

  /// A capability the host was expected to expose is missing.
  #[error("host integration unavailable: {0}")]
  HostIntegration(String),

  /// A remote document lacked a field the typed model requires.
  #[error("failed to parse {entity}: missing field `{field}`")]
  Parse {
    entity: &'static str,
    field: &'static str,
  },

  #[error("settings store error: {0}")]
  Settings(#[from] rusqlite::Error),

  #[error("configuration error: {0}")]
  Config(String),
}

impl Error {
  pub fn remote(err: impl std::fmt::Display) -> Self {
    Error::RemoteQuery(err.to_string())
  }

  pub fn validation(msg: impl Into<String>) -> Self {
    Error::Validation(msg.into())
  }
}

pub type Result<T> = std::result::Result<T, Error>;
