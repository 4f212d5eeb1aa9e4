//! Default shelveset name derived from the selected issue.

use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::jira::Issue;

use super::host::TextField;

/// Keeps the shelveset name in step with the selection until the user types
/// their own.
pub struct DefaultName {
  field: Arc<dyn TextField>,
  last_auto: Mutex<Option<String>>,
}

impl DefaultName {
  pub fn new(field: Arc<dyn TextField>) -> Self {
    Self {
      field,
      last_auto: Mutex::new(None),
    }
  }

  /// Recompute the name for `selected` unless the user edited it.
  pub fn update(&self, selected: Option<&Issue>) {
    let Ok(mut last_auto) = self.last_auto.lock() else {
      return;
    };

    let current = self.field.get();
    let untouched = match last_auto.as_deref() {
      Some(last) => current == last,
      None => current.is_empty(),
    };
    if !untouched {
      debug!("shelveset name edited by user, leaving it");
      return;
    }

    let name = selected.map(Issue::display_name).unwrap_or_default();
    self.field.set(&name);
    *last_auto = Some(name);
  }
}
