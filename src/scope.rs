//! Observation scopes.
//!
//! A host renders one tree of observers per [`ObservationScope`]. While a
//! scope is entered on the current thread, its synchronizer is what
//! [`Synchronizer::current`] returns, so every binding activated inside it
//! shares one batch without passing the synchronizer around explicitly.
//! Scopes nest; the innermost entered scope wins.
//!
//! Dropping the scope tears its synchronizer down (see
//! [`Synchronizer::close`]).

use std::{cell::RefCell, marker::PhantomData};

use crate::{error::ScopeError, scheduler::Scheduler, synchronizer::Synchronizer};

thread_local! {
  static SCOPES: RefCell<Vec<Synchronizer>> = const { RefCell::new(Vec::new()) };
}

/// Owns the synchronizer of one root observation tree.
pub struct ObservationScope {
  synchronizer: Synchronizer,
}

impl ObservationScope {
  /// Create a scope whose synchronizer flushes on `scheduler`.
  pub fn new(scheduler: impl Scheduler + 'static) -> Self {
    Self::with_synchronizer(Synchronizer::new(scheduler))
  }

  pub fn with_synchronizer(synchronizer: Synchronizer) -> Self { Self { synchronizer } }

  pub fn synchronizer(&self) -> &Synchronizer { &self.synchronizer }

  /// Make this scope current until the returned guard drops.
  pub fn enter(&self) -> ScopeGuard {
    SCOPES.with(|scopes| scopes.borrow_mut().push(self.synchronizer.clone()));
    tracing::trace!(depth = depth(), "observation scope entered");
    ScopeGuard { synchronizer: self.synchronizer.clone(), _not_send: PhantomData }
  }

  /// Run `f` with this scope current.
  pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
    let _guard = self.enter();
    f()
  }
}

impl Drop for ObservationScope {
  fn drop(&mut self) { self.synchronizer.close(); }
}

/// Keeps an [`ObservationScope`] current on this thread.
#[must_use]
pub struct ScopeGuard {
  synchronizer: Synchronizer,
  _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
  fn drop(&mut self) {
    SCOPES.with(|scopes| {
      let mut scopes = scopes.borrow_mut();
      if let Some(pos) = scopes
        .iter()
        .rposition(|s| s.ptr_eq(&self.synchronizer))
      {
        scopes.remove(pos);
      }
    });
    tracing::trace!(depth = depth(), "observation scope exited");
  }
}

fn depth() -> usize { SCOPES.with(|scopes| scopes.borrow().len()) }

impl Synchronizer {
  /// The synchronizer of the innermost entered scope.
  pub fn current() -> Result<Synchronizer, ScopeError> {
    Self::try_current().ok_or(ScopeError::NoSynchronizer)
  }

  /// Like [`Synchronizer::current`], but `None` outside any scope.
  pub fn try_current() -> Option<Synchronizer> {
    SCOPES.with(|scopes| scopes.borrow().last().cloned())
  }
}
