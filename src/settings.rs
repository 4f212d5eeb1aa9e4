//! Saved options (account, tenant, per-tenant issue type selection).
//!
//! Values carry their kind so a host store can protect encrypted values; the
//! SQLite store below records the kind but leaves protection at rest to the
//! file system.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
  Plain(String),
  Encrypted(String),
  Multi(Vec<String>),
}

impl SettingValue {
  fn kind(&self) -> &'static str {
    match self {
      SettingValue::Plain(_) => "plain",
      SettingValue::Encrypted(_) => "encrypted",
      SettingValue::Multi(_) => "multi",
    }
  }

  /// String content of a plain or encrypted value.
  pub fn as_str(&self) -> Option<&str> {
    match self {
      SettingValue::Plain(s) | SettingValue::Encrypted(s) => Some(s),
      SettingValue::Multi(_) => None,
    }
  }
}

/// Key/value option storage provided by the host.
pub trait SettingsStore: Send + Sync {
  fn get(&self, name: &str) -> Result<Option<SettingValue>>;

  fn set(&self, name: &str, value: SettingValue) -> Result<()>;

  fn get_string(&self, name: &str) -> Result<Option<String>> {
    Ok(self.get(name)?.and_then(|v| v.as_str().map(String::from)))
  }

  fn get_multi(&self, name: &str) -> Result<Option<Vec<String>>> {
    Ok(match self.get(name)? {
      Some(SettingValue::Multi(values)) => Some(values),
      _ => None,
    })
  }
}

#[derive(Default)]
pub struct MemorySettings {
  values: Mutex<HashMap<String, SettingValue>>,
}

impl MemorySettings {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SettingsStore for MemorySettings {
  fn get(&self, name: &str) -> Result<Option<SettingValue>> {
    let values = self
      .values
      .lock()
      .map_err(|_| Error::Config("settings lock poisoned".to_string()))?;
    Ok(values.get(name).cloned())
  }

  fn set(&self, name: &str, value: SettingValue) -> Result<()> {
    let mut values = self
      .values
      .lock()
      .map_err(|_| Error::Config("settings lock poisoned".to_string()))?;
    values.insert(name.to_string(), value);
    Ok(())
  }
}

/// SQLite-based settings store.
pub struct SqliteSettings {
  conn: Mutex<Connection>,
}

const SETTINGS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    name TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteSettings {
  /// Open the settings database at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Config(format!("Failed to create settings directory: {}", e)))?;
    }
    Self::with_connection(Connection::open(path)?)
  }

  pub fn open_in_memory() -> Result<Self> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn.execute_batch(SETTINGS_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("jira-checkin").join("settings.db"))
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|_| Error::Config("settings lock poisoned".to_string()))
  }
}

impl SettingsStore for SqliteSettings {
  fn get(&self, name: &str) -> Result<Option<SettingValue>> {
    let conn = self.lock()?;
    let row: Option<(String, String)> = conn
      .query_row(
        "SELECT kind, value FROM settings WHERE name = ?",
        params![name],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?;

    let Some((kind, value)) = row else {
      return Ok(None);
    };

    let value = match kind.as_str() {
      "plain" => SettingValue::Plain(value),
      "encrypted" => SettingValue::Encrypted(value),
      "multi" => SettingValue::Multi(
        serde_json::from_str(&value)
          .map_err(|e| Error::Config(format!("Corrupt setting {}: {}", name, e)))?,
      ),
      other => {
        return Err(Error::Config(format!(
          "Unknown kind {} for setting {}",
          other, name
        )))
      }
    };
    Ok(Some(value))
  }

  fn set(&self, name: &str, value: SettingValue) -> Result<()> {
    let stored = match &value {
      SettingValue::Plain(s) | SettingValue::Encrypted(s) => s.clone(),
      SettingValue::Multi(values) => serde_json::to_string(values)
        .map_err(|e| Error::Config(format!("Failed to encode setting {}: {}", name, e)))?,
    };

    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO settings (name, kind, value, updated_at)
       VALUES (?, ?, ?, datetime('now'))",
      params![name, value.kind(), stored],
    )?;
    Ok(())
  }
}
