//! Commands owned by the host, and a decorator that extends them in place.
//!
//! The host exposes a command through a single reference slot. Installing a
//! [`CommandInterceptor`] swaps that slot for a wrapper that runs injected
//! hooks around the original `execute`, while `can_execute` keeps answering
//! exactly as the original does. Wrapping an interceptor again nests them.

use std::any::Any;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

use crate::error::{Error, Result};

/// Opaque argument passed by the host to its commands.
pub type CommandArg<'a> = Option<&'a (dyn Any + Send + Sync)>;

/// Callback fired when a command's `can_execute` answer may have changed.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

pub trait Command: Send + Sync {
  fn can_execute(&self, arg: CommandArg<'_>) -> bool;

  fn execute(&self, arg: CommandArg<'_>);

  fn subscribe_can_execute_changed(&self, listener: Listener);
}

type ExecuteFn = Box<dyn Fn(CommandArg<'_>) + Send + Sync>;
type CanExecuteFn = Box<dyn Fn(CommandArg<'_>) -> bool + Send + Sync>;

/// Closure-backed command, the shape hosts typically expose.
pub struct RelayCommand {
  execute: ExecuteFn,
  can_execute: CanExecuteFn,
  listeners: Mutex<Vec<Listener>>,
}

impl RelayCommand {
  pub fn new(execute: impl Fn(CommandArg<'_>) + Send + Sync + 'static) -> Self {
    Self::with_can_execute(execute, |_| true)
  }

  pub fn with_can_execute(
    execute: impl Fn(CommandArg<'_>) + Send + Sync + 'static,
    can_execute: impl Fn(CommandArg<'_>) -> bool + Send + Sync + 'static,
  ) -> Self {
    Self {
      execute: Box::new(execute),
      can_execute: Box::new(can_execute),
      listeners: Mutex::new(Vec::new()),
    }
  }

  /// Notify subscribers that `can_execute` should be asked again.
  pub fn raise_can_execute_changed(&self) {
    let listeners = match self.listeners.lock() {
      Ok(listeners) => listeners.clone(),
      Err(_) => return,
    };
    for listener in listeners {
      listener();
    }
  }
}

impl Command for RelayCommand {
  fn can_execute(&self, arg: CommandArg<'_>) -> bool {
    (self.can_execute)(arg)
  }

  fn execute(&self, arg: CommandArg<'_>) {
    (self.execute)(arg)
  }

  fn subscribe_can_execute_changed(&self, listener: Listener) {
    if let Ok(mut listeners) = self.listeners.lock() {
      listeners.push(listener);
    }
  }
}

/// The externally visible reference through which the host invokes a command.
pub trait CommandSlot: Send + Sync {
  fn get(&self) -> Option<Arc<dyn Command>>;

  fn set(&self, command: Arc<dyn Command>);
}

/// A slot held in memory.
#[derive(Default)]
pub struct SharedSlot {
  command: RwLock<Option<Arc<dyn Command>>>,
}

impl SharedSlot {
  pub fn new(command: Arc<dyn Command>) -> Self {
    Self {
      command: RwLock::new(Some(command)),
    }
  }

  pub fn empty() -> Self {
    Self::default()
  }
}

impl CommandSlot for SharedSlot {
  fn get(&self) -> Option<Arc<dyn Command>> {
    self.command.read().ok().and_then(|c| c.clone())
  }

  fn set(&self, command: Arc<dyn Command>) {
    if let Ok(mut slot) = self.command.write() {
      *slot = Some(command);
    }
  }
}

/// Whether the wrapped command should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proceed {
  Continue,
  Skip,
}

/// Behavior injected around a wrapped command's `execute`.
pub trait Interception: Send + Sync {
  fn before(&self, _arg: CommandArg<'_>) -> Proceed {
    Proceed::Continue
  }

  /// Runs after the wrapped command; `executed` is false when `before` skipped it.
  fn after(&self, _inner: &dyn Command, _arg: CommandArg<'_>, _executed: bool) {}
}

type BeforeFn = Box<dyn Fn(CommandArg<'_>) -> Proceed + Send + Sync>;
type AfterFn = Box<dyn Fn(&dyn Command, CommandArg<'_>, bool) + Send + Sync>;

/// An [`Interception`] built from closures.
#[derive(Default)]
pub struct Hooks {
  before: Option<BeforeFn>,
  after: Option<AfterFn>,
}

impl Hooks {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn before(mut self, f: impl Fn(CommandArg<'_>) -> Proceed + Send + Sync + 'static) -> Self {
    self.before = Some(Box::new(f));
    self
  }

  pub fn after(
    mut self,
    f: impl Fn(&dyn Command, CommandArg<'_>, bool) + Send + Sync + 'static,
  ) -> Self {
    self.after = Some(Box::new(f));
    self
  }
}

impl Interception for Hooks {
  fn before(&self, arg: CommandArg<'_>) -> Proceed {
    self.before.as_ref().map_or(Proceed::Continue, |f| f(arg))
  }

  fn after(&self, inner: &dyn Command, arg: CommandArg<'_>, executed: bool) {
    if let Some(f) = &self.after {
      f(inner, arg, executed)
    }
  }
}

/// A command wrapping an externally owned one.
pub struct CommandInterceptor {
  inner: Arc<dyn Command>,
  hooks: Arc<dyn Interception>,
}

impl CommandInterceptor {
  pub fn new(inner: Arc<dyn Command>, hooks: Arc<dyn Interception>) -> Self {
    Self { inner, hooks }
  }

  /// Replace the command in `slot` with one wrapped by `hooks`.
  ///
  /// There is no uninstall; the wrapper stays for the slot's lifetime.
  pub fn install(
    slot: &dyn CommandSlot,
    name: &str,
    hooks: Arc<dyn Interception>,
  ) -> Result<Arc<CommandInterceptor>> {
    let inner = slot
      .get()
      .ok_or_else(|| Error::HostIntegration(format!("Could not find {} command", name)))?;

    let wrapper = Arc::new(Self::new(inner, hooks));
    slot.set(wrapper.clone());
    debug!(command = name, "command interceptor installed");
    Ok(wrapper)
  }

  pub fn inner(&self) -> &Arc<dyn Command> {
    &self.inner
  }
}

impl Command for CommandInterceptor {
  fn can_execute(&self, arg: CommandArg<'_>) -> bool {
    self.inner.can_execute(arg)
  }

  fn execute(&self, arg: CommandArg<'_>) {
    let proceed = self.hooks.before(arg);
    let executed = proceed == Proceed::Continue;
    if executed {
      self.inner.execute(arg);
    }
    self.hooks.after(self.inner.as_ref(), arg, executed);
  }

  fn subscribe_can_execute_changed(&self, listener: Listener) {
    self.inner.subscribe_can_execute_changed(listener);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

  fn toggled_command(enabled: Arc<AtomicBool>, runs: Arc<AtomicU32>) -> Arc<RelayCommand> {
    Arc::new(RelayCommand::with_can_execute(
      move |_| {
        runs.fetch_add(1, Ordering::SeqCst);
      },
      move |_| enabled.load(Ordering::SeqCst),
    ))
  }

  #[test]
  fn test_can_execute_always_delegates() {
    let enabled = Arc::new(AtomicBool::new(true));
    let runs = Arc::new(AtomicU32::new(0));
    let inner = toggled_command(enabled.clone(), runs.clone());

    // Hooks that flip unrelated state on every call must not influence can_execute
    let noise = Arc::new(AtomicBool::new(false));
    let (n1, n2) = (noise.clone(), noise.clone());
    let hooks = Hooks::new()
      .before(move |_| {
        n1.fetch_xor(true, Ordering::SeqCst);
        Proceed::Skip
      })
      .after(move |_, _, _| {
        n2.fetch_xor(true, Ordering::SeqCst);
      });
    let wrapper = CommandInterceptor::new(inner.clone(), Arc::new(hooks));

    for state in [true, false, true] {
      enabled.store(state, Ordering::SeqCst);
      wrapper.execute(None);
      assert_eq!(wrapper.can_execute(None), inner.can_execute(None));
      assert_eq!(wrapper.can_execute(Some(&5u32)), inner.can_execute(Some(&5u32)));
    }
  }

  #[test]
  fn test_execute_order_and_skip() {
    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let proceed = Arc::new(AtomicBool::new(true));

    let l = log.clone();
    let inner: Arc<dyn Command> = Arc::new(RelayCommand::new(move |_| l.lock().unwrap().push("inner".into())));

    let (l1, l2, p) = (log.clone(), log.clone(), proceed.clone());
    let hooks = Hooks::new()
      .before(move |_| {
        l1.lock().unwrap().push("before".into());
        if p.load(Ordering::SeqCst) {
          Proceed::Continue
        } else {
          Proceed::Skip
        }
      })
      .after(move |_, _, executed| l2.lock().unwrap().push(format!("after:{}", executed)));
    let wrapper = CommandInterceptor::new(inner, Arc::new(hooks));

    wrapper.execute(None);
    proceed.store(false, Ordering::SeqCst);
    wrapper.execute(None);

    assert_eq!(
      *log.lock().unwrap(),
      vec!["before", "inner", "after:true", "before", "after:false"]
    );
  }

  #[test]
  fn test_install_replaces_slot_and_nests() {
    let runs = Arc::new(AtomicU32::new(0));
    let inner = toggled_command(Arc::new(AtomicBool::new(true)), runs.clone());
    let slot = SharedSlot::new(inner);

    let order = Arc::new(Mutex::new(Vec::<&'static str>::new()));
    let (o1, o2) = (order.clone(), order.clone());
    CommandInterceptor::install(
      &slot,
      "check-in",
      Arc::new(Hooks::new().before(move |_| {
        o1.lock().unwrap().push("first");
        Proceed::Continue
      })),
    )
    .unwrap();
    CommandInterceptor::install(
      &slot,
      "check-in",
      Arc::new(Hooks::new().before(move |_| {
        o2.lock().unwrap().push("second");
        Proceed::Continue
      })),
    )
    .unwrap();

    slot.get().unwrap().execute(None);

    // Outermost wrapper runs first, the original runs once
    assert_eq!(*order.lock().unwrap(), vec!["second", "first"]);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_install_into_empty_slot_fails() {
    let slot = SharedSlot::empty();
    let err = CommandInterceptor::install(&slot, "check-in", Arc::new(Hooks::new()));
    assert!(matches!(err, Err(Error::HostIntegration(_))));
    assert!(slot.get().is_none());
  }

  #[test]
  fn test_can_execute_changed_is_forwarded() {
    let inner = Arc::new(RelayCommand::new(|_| {}));
    let wrapper = CommandInterceptor::new(inner.clone(), Arc::new(Hooks::new()));

    let fired = Arc::new(AtomicU32::new(0));
    let f = fired.clone();
    wrapper.subscribe_can_execute_changed(Arc::new(move || {
      f.fetch_add(1, Ordering::SeqCst);
    }));

    inner.raise_can_execute_changed();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
  }
}
