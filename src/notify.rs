//! User-visible notifications and blocking prompts.

use std::fmt::Display;
use tracing::{error, info};

/// Non-blocking messages shown to the user.
pub trait NotificationSink: Send + Sync {
  /// An informational message, optionally with a link the user can follow.
  fn info(&self, message: &str, link: Option<&str>);

  fn error(&self, message: &str);
}

/// Modal prompts owned by the host UI.
pub trait Prompter: Send + Sync {
  fn alert(&self, title: &str, message: &str);

  /// Ask a yes/no question; `true` means the user chose to continue.
  fn confirm(&self, title: &str, message: &str) -> bool;
}

/// Surface a failed result as "{prefix}: {error}" and swallow it.
pub fn report<T, E: Display>(
  sink: &dyn NotificationSink,
  prefix: &str,
  result: Result<T, E>,
) -> Option<T> {
  match result {
    Ok(value) => Some(value),
    Err(e) => {
      sink.error(&format!("{}: {}", prefix, e));
      None
    }
  }
}

/// Writes notifications to stderr and the log.
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
  fn info(&self, message: &str, link: Option<&str>) {
    info!(notice = message, link = link.unwrap_or(""), "notification");
    match link {
      Some(link) => eprintln!("{} ({})", message, link),
      None => eprintln!("{}", message),
    }
  }

  fn error(&self, message: &str) {
    error!(notice = message, "notification");
    eprintln!("error: {}", message);
  }
}
