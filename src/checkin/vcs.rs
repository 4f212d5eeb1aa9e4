//! Records read back from the host's version-control server.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{Error, Result};

bitflags::bitflags! {
  /// Set of change flags on one item of a changeset.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
  pub struct ChangeType: u16 {
    const ADD = 1;
    const EDIT = 1 << 1;
    const ENCODING = 1 << 2;
    const RENAME = 1 << 3;
    const DELETE = 1 << 4;
    const UNDELETE = 1 << 5;
    const BRANCH = 1 << 6;
    const MERGE = 1 << 7;
    const ROLLBACK = 1 << 8;
    const PROPERTY = 1 << 9;
  }
}

impl ChangeType {
  /// Flags worth showing: encoding is noise unless it is the only change,
  /// and an add already implies an edit.
  pub fn cleaned(self) -> ChangeType {
    if self == ChangeType::ENCODING {
      return self;
    }
    let flags = self.difference(ChangeType::ENCODING);
    if flags.contains(ChangeType::ADD) {
      flags.difference(ChangeType::EDIT)
    } else {
      flags
    }
  }
}

// "UNDELETE" is shown as "Undelete"
fn display_name(flag: &str) -> String {
  let mut chars = flag.chars();
  match chars.next() {
    Some(first) => first
      .to_uppercase()
      .chain(chars.flat_map(char::to_lowercase))
      .collect(),
    None => String::new(),
  }
}

impl fmt::Display for ChangeType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let names: Vec<String> = self.iter_names().map(|(name, _)| display_name(name)).collect();
    if names.is_empty() {
      f.write_str("None")
    } else {
      f.write_str(&names.join(", "))
    }
  }
}

impl std::str::FromStr for ChangeType {
  type Err = Error;

  /// Parses comma separated flag names, case-insensitively ("add, edit").
  fn from_str(s: &str) -> Result<Self> {
    s.split(',')
      .map(str::trim)
      .filter(|part| !part.is_empty())
      .try_fold(ChangeType::empty(), |acc, part| {
        ChangeType::from_name(&part.to_ascii_uppercase())
          .map(|flag| acc | flag)
          .ok_or_else(|| Error::validation(format!("Unknown change type: {}", part)))
      })
  }
}

impl Serialize for ChangeType {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for ChangeType {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

/// One changed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
  /// Server path, e.g. "$/Project/src/main.rs"
  pub server_item: String,
  pub change_type: ChangeType,
}

impl Change {
  /// Folder part including the trailing slash.
  pub fn folder(&self) -> &str {
    let split = self.server_item.rfind('/').map_or(0, |i| i + 1);
    &self.server_item[..split]
  }

  pub fn file_name(&self) -> &str {
    let split = self.server_item.rfind('/').map_or(0, |i| i + 1);
    &self.server_item[split..]
  }
}

/// A committed changeset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
  pub id: i64,
  #[serde(default)]
  pub comment: String,
  pub committer: String,
  /// Link to the changeset in the host's web view
  #[serde(default)]
  pub url: String,
  #[serde(default)]
  pub changes: Vec<Change>,
}

/// The host's version-control server.
#[async_trait]
pub trait VersionControl: Send + Sync {
  async fn changeset(&self, id: i64) -> Result<Changeset>;
}
