//! Check-in workflow: pre-flight validation, issue prefixing, rollback and
//! post-completion annotation around the host's own check-in command.
//!
//! ```text
//! Idle -> Validating -> Delegating -> AwaitingCompletion -> Succeeded | Failed -> Idle
//! ```
//!
//! Validation and delegation run synchronously inside the wrapped command's
//! `execute`. The host reports completion through an event that may fire on
//! any thread; the listener only tags the event with the request it belongs to
//! and forwards it over a channel to [`CheckinWorkflow::run`], where the
//! remote calls happen.

pub mod comment;
pub mod default_name;
pub mod host;
pub mod vcs;

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{Command, CommandArg, CommandInterceptor, Hooks, Interception, Proceed};
use crate::error::{Error, Result};
use crate::jira::{Issue, IssueRepository};
use crate::notify::{report, NotificationSink, Prompter};

use comment::changeset_comment;
use default_name::DefaultName;
use host::{CompletionSource, HostCapabilities, TextField};
use vcs::VersionControl;

pub const COMMENT_REQUIRED_TITLE: &str = "Check-in Comment Required";
pub const COMMENT_REQUIRED_MESSAGE: &str =
  "You must enter a check-in comment before you can checkin these changes";
pub const NO_ISSUE_TITLE: &str = "No Jira Issue Selected";
pub const NO_ISSUE_MESSAGE: &str = "This checkin is not associated with a Jira Issue.  Nearly all TFS check-ins should be associated with a Jira Issue.  Are you sure you want to continue?";

/// The issue list the workflow reads its selection from and refreshes.
#[async_trait]
pub trait IssueContext: Send + Sync {
  fn selected(&self) -> Option<Issue>;

  fn clear_selection(&self);

  /// Re-run the list query under the current filter.
  async fn refresh(&self) -> Result<()>;
}

/// Everything the workflow talks to besides the host.
#[derive(Clone)]
pub struct Collaborators {
  pub issues: Arc<dyn IssueContext>,
  pub repository: Arc<dyn IssueRepository>,
  pub vcs: Arc<dyn VersionControl>,
  pub prompter: Arc<dyn Prompter>,
  pub notifier: Arc<dyn NotificationSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Idle,
  Validating,
  Delegating,
  AwaitingCompletion,
  Succeeded,
  Failed,
}

/// A completion event tagged with the request that was active when it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSignal {
  pub request: u64,
  pub result_id: i64,
}

/// What handling a completion signal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// The signal did not belong to the active request.
  Discarded,
  /// The check-in committed; `annotated` is the issue that got a comment.
  Committed {
    changeset: i64,
    annotated: Option<String>,
  },
  /// The check-in failed and the issue prefix was removed.
  Reverted,
}

/// Context recorded when a check-in is handed to the host.
#[derive(Debug)]
struct Pending {
  request: u64,
  original: String,
  /// Exact text prepended to the comment, if any
  prefix: Option<String>,
  issue: Option<Issue>,
}

struct State {
  phase: Phase,
  pending: Option<Pending>,
}

/// Text prepended to a check-in comment for `issue`.
///
/// The separator is a line break when the comment already spans lines.
pub fn issue_prefix(issue: &Issue, comment: &str) -> String {
  let separator = if comment.contains("\r\n") { "\r\n" } else { " " };
  match issue.parent_key.as_deref() {
    Some(parent) => format!("{}-{}:{}", parent, issue.key, separator),
    None => format!("{}:{}", issue.key, separator),
  }
}

/// `comment` without a leading prefix for `issue_key`, written either as
/// `"{parent}-{key}:"` or `"{key}:"` and followed by a space or line break.
pub fn strip_issue_prefix<'a>(issue_key: &str, comment: &'a str) -> &'a str {
  let Some((head, rest)) = comment.split_once(':') else {
    return comment;
  };
  let names_issue = !head.contains(char::is_whitespace)
    && (head == issue_key
      || head
        .strip_suffix(issue_key)
        .is_some_and(|parent| parent.len() > 1 && parent.ends_with('-')));
  if !names_issue {
    return comment;
  }
  rest
    .strip_prefix("\r\n")
    .or_else(|| rest.strip_prefix(' '))
    .unwrap_or(comment)
}

pub struct CheckinWorkflow {
  comment: Arc<dyn TextField>,
  deps: Collaborators,
  state: Mutex<State>,
  // Read by the completion listener on the host's thread; 0 when idle
  active_request: Arc<AtomicU64>,
  next_request: AtomicU64,
}

impl CheckinWorkflow {
  pub fn new(comment: Arc<dyn TextField>, deps: Collaborators) -> Self {
    Self {
      comment,
      deps,
      state: Mutex::new(State {
        phase: Phase::Idle,
        pending: None,
      }),
      active_request: Arc::new(AtomicU64::new(0)),
      next_request: AtomicU64::new(0),
    }
  }

  pub fn phase(&self) -> Phase {
    self.state.lock().map_or(Phase::Idle, |s| s.phase)
  }

  fn set_phase(&self, phase: Phase) {
    if let Ok(mut state) = self.state.lock() {
      state.phase = phase;
    }
  }

  /// Subscribe to the host's completion event. Call once per source.
  pub fn listen(&self, source: &Arc<dyn CompletionSource>, tx: mpsc::UnboundedSender<CompletionSignal>) {
    let active = Arc::clone(&self.active_request);
    let weak = Arc::downgrade(source);
    source.subscribe(Box::new(move || {
      let Some(source) = weak.upgrade() else {
        return;
      };
      let signal = CompletionSignal {
        request: active.load(Ordering::SeqCst),
        result_id: source.last_result_id(),
      };
      if tx.send(signal).is_err() {
        debug!("completion driver stopped, signal dropped");
      }
    }));
  }

  /// Drive completion handling until every sender is gone.
  pub async fn run(self: Arc<Self>, mut signals: mpsc::UnboundedReceiver<CompletionSignal>) {
    while let Some(signal) = signals.recv().await {
      let outcome = self.handle_completion(signal).await;
      debug!(?outcome, "completion handled");
    }
  }

  pub async fn handle_completion(&self, signal: CompletionSignal) -> Outcome {
    let pending = {
      let Ok(mut state) = self.state.lock() else {
        return Outcome::Discarded;
      };
      let pending = match state.pending.take() {
        Some(pending) if pending.request == signal.request => pending,
        other => {
          debug!(request = signal.request, "discarding completion for inactive request");
          state.pending = other;
          return Outcome::Discarded;
        }
      };
      state.phase = if signal.result_id > 0 {
        Phase::Succeeded
      } else {
        Phase::Failed
      };
      pending
    };
    let _ = self.active_request.compare_exchange(
      signal.request,
      0,
      Ordering::SeqCst,
      Ordering::SeqCst,
    );

    let outcome = if signal.result_id > 0 {
      self.succeeded(signal.result_id, pending).await
    } else {
      self.failed(pending)
    };

    // A new check-in may have started while the remote calls ran
    if let Ok(mut state) = self.state.lock() {
      if matches!(state.phase, Phase::Succeeded | Phase::Failed) {
        state.phase = Phase::Idle;
      }
    }
    outcome
  }

  async fn succeeded(&self, changeset: i64, pending: Pending) -> Outcome {
    info!(changeset, "check-in committed");
    let Some(issue) = pending.issue else {
      return Outcome::Committed {
        changeset,
        annotated: None,
      };
    };

    let annotated = self.annotate(changeset, &issue, &pending.original).await;

    if let Err(e) = self.deps.issues.refresh().await {
      self
        .deps
        .notifier
        .error(&format!("Error refreshing Issues: {}", e));
    }
    self.deps.issues.clear_selection();

    Outcome::Committed {
      changeset,
      annotated: annotated.then(|| issue.key.clone()),
    }
  }

  async fn annotate(&self, changeset_id: i64, issue: &Issue, original: &str) -> bool {
    let result: Result<bool> = async {
      let changeset = self.deps.vcs.changeset(changeset_id).await?;
      let body = changeset_comment(&changeset, original).to_value();
      self.deps.repository.add_comment(&issue.key, &body).await
    }
    .await;

    let notifier = self.deps.notifier.as_ref();
    match report(notifier, "Error adding Jira Comment", result) {
      Some(true) => {
        info!(issue = %issue.key, changeset = changeset_id, "issue annotated");
        notifier.info(
          &format!("Jira Comment added to {}", issue.key),
          Some(&issue.detail_url()),
        );
        true
      }
      Some(false) => {
        notifier.error(&format!("Jira did not accept the comment for {}", issue.key));
        false
      }
      None => false,
    }
  }

  fn failed(&self, pending: Pending) -> Outcome {
    if let Some(prefix) = pending.prefix {
      let current = self.comment.get();
      if let Some(rest) = current.strip_prefix(prefix.as_str()) {
        self.comment.set(rest);
      }
    }
    warn!(request = pending.request, "check-in failed, comment restored");
    Outcome::Reverted
  }
}

impl Interception for CheckinWorkflow {
  fn before(&self, _arg: CommandArg<'_>) -> Proceed {
    self.set_phase(Phase::Validating);

    let original = self.comment.get();
    if original.trim().is_empty() {
      info!("check-in blocked: empty comment");
      self
        .deps
        .prompter
        .alert(COMMENT_REQUIRED_TITLE, COMMENT_REQUIRED_MESSAGE);
      self.set_phase(Phase::Idle);
      return Proceed::Skip;
    }

    let issue = self.deps.issues.selected();
    let prefix = match &issue {
      Some(issue) => {
        let prefix = issue_prefix(issue, &original);
        self.comment.set(&format!("{}{}", prefix, original));
        Some(prefix)
      }
      None => {
        if !self.deps.prompter.confirm(NO_ISSUE_TITLE, NO_ISSUE_MESSAGE) {
          info!("check-in cancelled: no issue selected");
          self.set_phase(Phase::Idle);
          return Proceed::Skip;
        }
        None
      }
    };

    let request = self.next_request.fetch_add(1, Ordering::SeqCst) + 1;
    if let Ok(mut state) = self.state.lock() {
      let pending = Pending {
        request,
        original,
        prefix,
        issue,
      };
      if let Some(stale) = state.pending.replace(pending) {
        warn!(request = stale.request, "superseding unfinished check-in");
      }
      state.phase = Phase::Delegating;
    }
    self.active_request.store(request, Ordering::SeqCst);
    debug!(request, "delegating check-in");
    Proceed::Continue
  }

  fn after(&self, inner: &dyn Command, _arg: CommandArg<'_>, executed: bool) {
    if !executed {
      return;
    }
    let Ok(mut state) = self.state.lock() else {
      return;
    };
    // Completion may already have been handled
    if state.phase != Phase::Delegating {
      return;
    }

    if inner.can_execute(None) {
      if let Some(pending) = state.pending.take() {
        self.comment.set(&pending.original);
      }
      self.active_request.store(0, Ordering::SeqCst);
      state.phase = Phase::Idle;
      info!("check-in did not start, comment restored");
    } else {
      state.phase = Phase::AwaitingCompletion;
    }
  }
}

// ============================================================================
// Host integration
// ============================================================================

/// The features installed on a host.
pub struct Integration {
  pub workflow: Option<Arc<CheckinWorkflow>>,
  pub default_name: Option<Arc<DefaultName>>,
  pub signals: Option<mpsc::UnboundedReceiver<CompletionSignal>>,
}

impl Integration {
  /// Start the completion driver on the current runtime.
  pub fn spawn_driver(&mut self) -> Option<JoinHandle<()>> {
    let workflow = self.workflow.clone()?;
    let signals = self.signals.take()?;
    Some(tokio::spawn(workflow.run(signals)))
  }
}

/// Install the check-in workflow and the default shelveset name on `host`.
///
/// Each missing capability is reported once through the notifier and only
/// the feature depending on it is skipped.
pub fn integrate(host: &HostCapabilities, deps: Collaborators) -> Integration {
  let notifier = Arc::clone(&deps.notifier);
  let unavailable = |err: Error| {
    warn!(error = %err, "host capability missing");
    notifier.error(&err.to_string());
  };
  let missing = |what: &str| Error::HostIntegration(format!("Could not find {}", what));

  let mut signals = None;
  let workflow = match (&host.checkin_command, &host.comment_field, &host.completion) {
    (Some(slot), Some(field), Some(source)) => {
      let workflow = Arc::new(CheckinWorkflow::new(Arc::clone(field), deps.clone()));
      match CommandInterceptor::install(slot.as_ref(), "check-in", workflow.clone()) {
        Ok(_) => {
          let (tx, rx) = mpsc::unbounded_channel();
          workflow.listen(source, tx);
          signals = Some(rx);
          Some(workflow)
        }
        Err(e) => {
          unavailable(e);
          None
        }
      }
    }
    (slot, field, source) => {
      if slot.is_none() {
        unavailable(missing("check-in command"));
      }
      if field.is_none() {
        unavailable(missing("check-in comment field"));
      }
      if source.is_none() {
        unavailable(missing("check-in completion event"));
      }
      None
    }
  };

  let default_name = match (&host.shelveset_toggle, &host.shelveset_name) {
    (Some(slot), Some(field)) => {
      let name = Arc::new(DefaultName::new(Arc::clone(field)));
      let (hook_name, issues) = (Arc::clone(&name), Arc::clone(&deps.issues));
      let hooks = Hooks::new().after(move |_, _, executed| {
        if executed {
          hook_name.update(issues.selected().as_ref());
        }
      });
      match CommandInterceptor::install(slot.as_ref(), "shelveset toggle", Arc::new(hooks)) {
        Ok(_) => Some(name),
        Err(e) => {
          unavailable(e);
          None
        }
      }
    }
    (slot, field) => {
      if slot.is_none() {
        unavailable(missing("shelveset toggle command"));
      }
      if field.is_none() {
        unavailable(missing("shelveset name field"));
      }
      None
    }
  };

  Integration {
    workflow,
    default_name,
    signals,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::command::{CommandSlot, RelayCommand, SharedSlot};
  use crate::jira::testing::{issue, FakeRepository};
  use crate::notify::testing::{Notice, RecordingSink, ScriptedPrompter};
  use host::testing::ManualCompletion;
  use host::SharedText;
  use std::sync::atomic::{AtomicBool, AtomicU32};
  use std::time::Duration;
  use vcs::testing::FakeVersionControl;
  use vcs::{Change, ChangeType, Changeset};

  #[derive(Default)]
  struct FakeIssues {
    selected: Mutex<Option<Issue>>,
    refreshes: AtomicU32,
    fail_refresh: AtomicBool,
  }

  #[async_trait]
  impl IssueContext for FakeIssues {
    fn selected(&self) -> Option<Issue> {
      self.selected.lock().unwrap().clone()
    }

    fn clear_selection(&self) {
      *self.selected.lock().unwrap() = None;
    }

    async fn refresh(&self) -> Result<()> {
      self.refreshes.fetch_add(1, Ordering::SeqCst);
      if self.fail_refresh.load(Ordering::SeqCst) {
        return Err(Error::remote("timeout"));
      }
      Ok(())
    }
  }

  fn changeset() -> Changeset {
    let change = |path: &str, change_type| Change {
      server_item: path.to_string(),
      change_type,
    };
    Changeset {
      id: 42,
      comment: "PARENT-123: abc".to_string(),
      committer: "Alice".to_string(),
      url: "https://tfs.example.com/cs?cs=42".to_string(),
      changes: vec![
        change("/src/feature/a.rs", ChangeType::ADD),
        change("/src/feature/ui/b.rs", ChangeType::EDIT),
        change("/src/feature/c.rs", ChangeType::DELETE),
      ],
    }
  }

  struct Harness {
    comment: Arc<SharedText>,
    slot: Arc<SharedSlot>,
    completion: Arc<ManualCompletion>,
    issues: Arc<FakeIssues>,
    repository: Arc<FakeRepository>,
    prompter: Arc<ScriptedPrompter>,
    notifier: Arc<RecordingSink>,
    /// Whether the host command stays enabled after execute (check-in did not start)
    start_fails: Arc<AtomicBool>,
    executions: Arc<AtomicU32>,
    integration: Integration,
  }

  impl Harness {
    fn new(comment: &str, selected: Option<Issue>, answers: &[bool]) -> Self {
      let enabled = Arc::new(AtomicBool::new(true));
      let start_fails = Arc::new(AtomicBool::new(false));
      let executions = Arc::new(AtomicU32::new(0));
      let (e, s, runs) = (enabled.clone(), start_fails.clone(), executions.clone());
      let host_command = RelayCommand::with_can_execute(
        move |_| {
          runs.fetch_add(1, Ordering::SeqCst);
          if !s.load(Ordering::SeqCst) {
            e.store(false, Ordering::SeqCst);
          }
        },
        move |_| enabled.load(Ordering::SeqCst),
      );

      let comment = Arc::new(SharedText::new(comment));
      let slot = Arc::new(SharedSlot::new(Arc::new(host_command)));
      let completion = Arc::new(ManualCompletion::default());
      let issues = Arc::new(FakeIssues::default());
      *issues.selected.lock().unwrap() = selected;
      let repository = Arc::new(FakeRepository::new(Vec::new()));
      let prompter = Arc::new(ScriptedPrompter::answering(answers));
      let notifier = Arc::new(RecordingSink::default());

      let host = HostCapabilities {
        checkin_command: Some(slot.clone()),
        comment_field: Some(comment.clone()),
        completion: Some(completion.clone()),
        shelveset_toggle: Some(Arc::new(SharedSlot::new(Arc::new(RelayCommand::new(|_| {}))))),
        shelveset_name: Some(Arc::new(SharedText::default())),
      };
      let deps = Collaborators {
        issues: issues.clone(),
        repository: repository.clone(),
        vcs: Arc::new(FakeVersionControl::with(changeset())),
        prompter: prompter.clone(),
        notifier: notifier.clone(),
      };
      let integration = integrate(&host, deps);

      Self {
        comment,
        slot,
        completion,
        issues,
        repository,
        prompter,
        notifier,
        start_fails,
        executions,
        integration,
      }
    }

    fn workflow(&self) -> Arc<CheckinWorkflow> {
      self.integration.workflow.clone().unwrap()
    }

    fn check_in(&self) {
      self.slot.get().unwrap().execute(None);
    }

    /// Fire the host completion event and return the signal it produced.
    fn complete(&mut self, id: i64) -> CompletionSignal {
      self.completion.complete(id);
      self.integration.signals.as_mut().unwrap().try_recv().unwrap()
    }
  }

  fn selected_issue() -> Option<Issue> {
    Some(issue("123", "Fix login"))
  }

  #[tokio::test]
  async fn test_success_prefixes_and_annotates() {
    let mut h = Harness::new("abc", selected_issue(), &[]);

    h.check_in();
    assert_eq!(h.comment.get(), "PARENT-123: abc");
    assert_eq!(h.workflow().phase(), Phase::AwaitingCompletion);

    let signal = h.complete(42);
    let outcome = h.workflow().handle_completion(signal).await;
    assert_eq!(
      outcome,
      Outcome::Committed {
        changeset: 42,
        annotated: Some("123".to_string())
      }
    );

    let comments = h.repository.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].0, "123");
    assert_eq!(
      serde_json::to_string(&comments[0].1).unwrap(),
      serde_json::to_string(&changeset_comment(&changeset(), "abc")).unwrap()
    );

    assert!(h.notifier.notices().contains(&Notice::Info {
      message: "Jira Comment added to 123".to_string(),
      link: Some("https://acme.atlassian.net/browse/123".to_string()),
    }));
    assert_eq!(h.issues.refreshes.load(Ordering::SeqCst), 1);
    assert!(h.issues.selected().is_none());
    assert_eq!(h.workflow().phase(), Phase::Idle);
  }

  #[tokio::test]
  async fn test_failure_restores_original_comment() {
    let mut h = Harness::new("abc", selected_issue(), &[]);

    h.check_in();
    let signal = h.complete(0);
    assert_eq!(h.workflow().handle_completion(signal).await, Outcome::Reverted);

    assert_eq!(h.comment.get(), "abc");
    assert!(h.repository.comments().is_empty());
    assert_eq!(h.workflow().phase(), Phase::Idle);
  }

  #[tokio::test]
  async fn test_failure_strips_recorded_prefix_after_selection_change() {
    let mut h = Harness::new("abc", selected_issue(), &[]);

    h.check_in();
    *h.issues.selected.lock().unwrap() = Some(issue("999", "Other"));
    let signal = h.complete(-1);
    h.workflow().handle_completion(signal).await;

    assert_eq!(h.comment.get(), "abc");
  }

  #[test]
  fn test_multiline_comment_uses_line_break_separator() {
    let h = Harness::new("line one\r\nline two", selected_issue(), &[]);
    h.check_in();
    assert_eq!(h.comment.get(), "PARENT-123:\r\nline one\r\nline two");
  }

  #[test]
  fn test_missing_parent_key_prefix() {
    let mut orphan = issue("123", "Fix login");
    orphan.parent_key = None;
    assert_eq!(issue_prefix(&orphan, "abc"), "123: ");
  }

  #[test]
  fn test_strip_issue_prefix() {
    assert_eq!(strip_issue_prefix("123", "PARENT-123: Fix login"), "Fix login");
    assert_eq!(
      strip_issue_prefix("123", "PARENT-123:\r\nline one\r\nline two"),
      "line one\r\nline two"
    );
    assert_eq!(strip_issue_prefix("123", "123: Fix login"), "Fix login");

    // Other issues and ordinary colons are left alone
    assert_eq!(strip_issue_prefix("123", "PARENT-124: Fix"), "PARENT-124: Fix");
    assert_eq!(strip_issue_prefix("123", "X123: Fix"), "X123: Fix");
    assert_eq!(strip_issue_prefix("123", "Fix 123: again"), "Fix 123: again");
    assert_eq!(strip_issue_prefix("123", "PARENT-123:Fix"), "PARENT-123:Fix");
    assert_eq!(strip_issue_prefix("123", "no prefix"), "no prefix");
  }

  #[test]
  fn test_blank_comment_blocks_check_in() {
    let h = Harness::new("   ", selected_issue(), &[]);

    h.check_in();
    assert_eq!(h.prompter.prompts(), vec![COMMENT_REQUIRED_TITLE]);
    assert_eq!(h.executions.load(Ordering::SeqCst), 0);
    assert_eq!(h.comment.get(), "   ");
    assert_eq!(h.workflow().phase(), Phase::Idle);
  }

  #[test]
  fn test_no_selection_declined() {
    let h = Harness::new("abc", None, &[false]);

    h.check_in();
    assert_eq!(h.prompter.prompts(), vec![NO_ISSUE_TITLE]);
    assert_eq!(h.executions.load(Ordering::SeqCst), 0);
    assert_eq!(h.comment.get(), "abc");
    assert_eq!(h.workflow().phase(), Phase::Idle);
  }

  #[tokio::test]
  async fn test_no_selection_accepted_checks_in_unmodified() {
    let mut h = Harness::new("abc", None, &[true]);

    h.check_in();
    assert_eq!(h.executions.load(Ordering::SeqCst), 1);
    assert_eq!(h.comment.get(), "abc");

    let signal = h.complete(42);
    assert_eq!(
      h.workflow().handle_completion(signal).await,
      Outcome::Committed {
        changeset: 42,
        annotated: None
      }
    );
    assert!(h.repository.comments().is_empty());
  }

  #[tokio::test]
  async fn test_command_still_enabled_rolls_back_immediately() {
    let mut h = Harness::new("abc", selected_issue(), &[]);
    h.start_fails.store(true, Ordering::SeqCst);

    h.check_in();
    assert_eq!(h.comment.get(), "abc");
    assert_eq!(h.workflow().phase(), Phase::Idle);

    // A late event for the abandoned request is ignored
    let signal = h.complete(42);
    assert_eq!(signal.request, 0);
    assert_eq!(h.workflow().handle_completion(signal).await, Outcome::Discarded);
    assert!(h.repository.comments().is_empty());
  }

  #[tokio::test]
  async fn test_stale_signal_discarded() {
    let mut h = Harness::new("abc", selected_issue(), &[]);

    h.check_in();
    let first = h.complete(0);

    // Superseded by a second check-in before the first signal was handled
    h.comment.set("def");
    h.check_in();
    assert_eq!(h.comment.get(), "PARENT-123: def");

    assert_eq!(h.workflow().handle_completion(first).await, Outcome::Discarded);
    assert_eq!(h.comment.get(), "PARENT-123: def");

    let second = h.complete(42);
    assert_eq!(second.request, first.request + 1);
    assert!(matches!(
      h.workflow().handle_completion(second).await,
      Outcome::Committed { changeset: 42, .. }
    ));
  }

  #[tokio::test]
  async fn test_remote_failures_are_notified() {
    let mut h = Harness::new("abc", selected_issue(), &[]);
    h.repository.reject_comment.store(true, Ordering::SeqCst);
    h.issues.fail_refresh.store(true, Ordering::SeqCst);

    h.check_in();
    let signal = h.complete(42);
    let outcome = h.workflow().handle_completion(signal).await;

    assert_eq!(
      outcome,
      Outcome::Committed {
        changeset: 42,
        annotated: None
      }
    );
    assert_eq!(
      h.notifier.errors(),
      vec![
        "Jira did not accept the comment for 123".to_string(),
        "Error refreshing Issues: remote query failed: timeout".to_string(),
      ]
    );
    assert!(h.issues.selected().is_none());
  }

  #[tokio::test]
  async fn test_unknown_changeset_reported_once() {
    let mut h = Harness::new("abc", selected_issue(), &[]);

    h.check_in();
    let signal = h.complete(7);
    h.workflow().handle_completion(signal).await;

    assert_eq!(
      h.notifier.errors(),
      vec!["Error adding Jira Comment: remote query failed: Changeset 7 not found".to_string()]
    );
    assert!(h.repository.comments().is_empty());
  }

  #[tokio::test]
  async fn test_driver_handles_signals_from_the_channel() {
    let mut h = Harness::new("abc", selected_issue(), &[]);
    let driver = h.integration.spawn_driver().unwrap();

    h.check_in();
    h.completion.complete(42);

    tokio::time::timeout(Duration::from_secs(5), async {
      while h.repository.comments().is_empty() {
        tokio::task::yield_now().await;
      }
    })
    .await
    .unwrap();

    assert_eq!(h.repository.comments()[0].0, "123");
    assert_eq!(h.completion.listener_count(), 1);
    driver.abort();
  }

  #[test]
  fn test_missing_capabilities_reported_per_feature() {
    let notifier = Arc::new(RecordingSink::default());
    let deps = Collaborators {
      issues: Arc::new(FakeIssues::default()),
      repository: Arc::new(FakeRepository::new(Vec::new())),
      vcs: Arc::new(FakeVersionControl::default()),
      prompter: Arc::new(ScriptedPrompter::default()),
      notifier: notifier.clone(),
    };
    let name_field = Arc::new(SharedText::default());
    let host = HostCapabilities {
      checkin_command: Some(Arc::new(SharedSlot::empty())),
      comment_field: Some(Arc::new(SharedText::default())),
      completion: Some(Arc::new(ManualCompletion::default())),
      shelveset_name: Some(name_field),
      ..Default::default()
    };

    let integration = integrate(&host, deps);

    assert!(integration.workflow.is_none());
    assert!(integration.default_name.is_none());
    assert_eq!(
      notifier.errors(),
      vec![
        "host integration unavailable: Could not find check-in command".to_string(),
        "host integration unavailable: Could not find shelveset toggle command".to_string(),
      ]
    );
  }

  #[test]
  fn test_shelveset_toggle_sets_default_name() {
    let issues = Arc::new(FakeIssues::default());
    *issues.selected.lock().unwrap() = Some(issue("PRJ-7", "Paging"));
    let toggle = Arc::new(SharedSlot::new(Arc::new(RelayCommand::new(|_| {}))));
    let name_field = Arc::new(SharedText::default());
    let host = HostCapabilities {
      shelveset_toggle: Some(toggle.clone()),
      shelveset_name: Some(name_field.clone()),
      ..Default::default()
    };
    let deps = Collaborators {
      issues,
      repository: Arc::new(FakeRepository::new(Vec::new())),
      vcs: Arc::new(FakeVersionControl::default()),
      prompter: Arc::new(ScriptedPrompter::default()),
      notifier: Arc::new(RecordingSink::default()),
    };

    let integration = integrate(&host, deps);
    assert!(integration.default_name.is_some());

    toggle.get().unwrap().execute(None);
    assert_eq!(name_field.get(), "PRJ-7: Paging");
  }
}
