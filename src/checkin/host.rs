//! What the host check-in surface exposes to the integration.

use std::sync::{Arc, Mutex};

use crate::command::CommandSlot;

/// A text value owned by the host (check-in comment, shelveset name).
pub trait TextField: Send + Sync {
  fn get(&self) -> String;

  fn set(&self, value: &str);
}

/// The host's "check-in finished" event.
pub trait CompletionSource: Send + Sync {
  /// Register a listener; it may be called from any thread.
  fn subscribe(&self, listener: Box<dyn Fn() + Send + Sync>);

  /// Id of the last check-in result. Positive ids are committed changesets;
  /// anything else means the check-in failed or was cancelled.
  fn last_result_id(&self) -> i64;
}

/// Capabilities found on the host at integration time. Any may be missing.
#[derive(Default, Clone)]
pub struct HostCapabilities {
  pub checkin_command: Option<Arc<dyn CommandSlot>>,
  pub shelveset_toggle: Option<Arc<dyn CommandSlot>>,
  pub comment_field: Option<Arc<dyn TextField>>,
  pub shelveset_name: Option<Arc<dyn TextField>>,
  pub completion: Option<Arc<dyn CompletionSource>>,
}

/// A text field held in memory.
#[derive(Debug, Default)]
pub struct SharedText {
  value: Mutex<String>,
}

impl SharedText {
  pub fn new(value: impl Into<String>) -> Self {
    Self {
      value: Mutex::new(value.into()),
    }
  }
}

impl TextField for SharedText {
  fn get(&self) -> String {
    self.value.lock().map(|v| v.clone()).unwrap_or_default()
  }

  fn set(&self, value: &str) {
    if let Ok(mut current) = self.value.lock() {
      *current = value.to_string();
    }
  }
}
