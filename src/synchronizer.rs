//! Cross-subject resolution barrier.
//!
//! Subjects hand the resolution of their update requests to a
//! [`Synchronizer`] instead of running it themselves. The synchronizer
//! collects every callback contributed during a pass into one batch and fires
//! the whole batch back to back in a single flush. Observers of different
//! subjects, or of one subject that tore several times, therefore move to the
//! new snapshot in the same step.
//!
//! The flush trigger is whatever [`Scheduler`] the synchronizer was built
//! with: a next-turn executor, the host's commit hook
//! ([`ManualScheduler`](crate::scheduler::ManualScheduler)), or immediate
//! execution.

use std::{
  fmt::{Debug, Formatter},
  rc::Rc,
};

use crate::{
  rc::{MutRc, RcDeref, RcDerefMut},
  scheduler::{ImmediateScheduler, Scheduler, Task},
};

#[derive(Default)]
struct SyncState {
  batch: Vec<Task>,
  armed: bool,
  closed: bool,
  /// Bumped by every flush; a trigger only fires the batch it was armed for.
  generation: u64,
}

/// Batches resolution callbacks and fires them together.
///
/// Clones share one batch. One synchronizer exists per observation scope, see
/// [`ObservationScope`](crate::scope::ObservationScope).
///
/// # Invariants
///
/// 1. At most one flush is armed per batch.
/// 2. A flush runs callbacks in contribution order and never runs a partial
///    batch.
/// 3. Callbacks contributed while a flush runs form the next batch, which arms
///    its own flush.
/// 4. Once closed, contributions run immediately.
/// 5. A trigger outliving its batch (flushed explicitly) is a no-op.
#[derive(Clone)]
pub struct Synchronizer {
  state: MutRc<SyncState>,
  scheduler: Rc<dyn Scheduler>,
}

impl Synchronizer {
  pub fn new(scheduler: impl Scheduler + 'static) -> Self { Self::with_scheduler(Rc::new(scheduler)) }

  pub fn with_scheduler(scheduler: Rc<dyn Scheduler>) -> Self {
    Self { state: MutRc::own(SyncState::default()), scheduler }
  }

  /// A synchronizer whose flush fires inside `synchronize` itself.
  pub fn immediate() -> Self { Self::new(ImmediateScheduler) }

  /// Append `callback` to the current batch, arming a flush if none is armed.
  pub fn synchronize(&self, callback: impl FnOnce() + 'static) {
    let mut state = self.state.rc_deref_mut();
    if state.closed {
      drop(state);
      callback();
      return;
    }
    state.batch.push(Box::new(callback));
    let arm = !std::mem::replace(&mut state.armed, true);
    let generation = state.generation;
    drop(state);

    if arm {
      let this = self.clone();
      self.scheduler.schedule(Box::new(move || this.fire(generation)));
    }
  }

  fn fire(&self, generation: u64) {
    let current = self.state.rc_deref().generation == generation;
    if current {
      self.flush();
    } else {
      tracing::trace!(generation, "stale synchronizer trigger ignored");
    }
  }

  /// Fire the current batch now. Returns how many callbacks ran.
  ///
  /// The armed trigger calls this; hosts with an explicit commit phase may
  /// call it directly. The trigger armed for the flushed batch then does
  /// nothing when it fires, even if a newer batch is waiting by then.
  pub fn flush(&self) -> usize {
    let batch = {
      let mut state = self.state.rc_deref_mut();
      state.armed = false;
      state.generation += 1;
      std::mem::take(&mut state.batch)
    };
    let len = batch.len();
    if len > 0 {
      tracing::trace!(callbacks = len, "synchronizer flush");
    }
    batch.into_iter().for_each(|callback| callback());
    len
  }

  /// Tear the synchronizer down with its scope: the pending batch runs now and
  /// later contributions run immediately.
  pub fn close(&self) {
    let was_closed = std::mem::replace(&mut self.state.rc_deref_mut().closed, true);
    if !was_closed {
      tracing::trace!("synchronizer closed");
      self.flush();
    }
  }

  pub fn is_closed(&self) -> bool { self.state.rc_deref().closed }

  /// Number of callbacks waiting in the current batch.
  pub fn pending(&self) -> usize { self.state.rc_deref().batch.len() }

  pub fn is_armed(&self) -> bool { self.state.rc_deref().armed }

  pub fn ptr_eq(&self, other: &Self) -> bool { self.state.ptr_eq(&other.state) }
}

impl Debug for Synchronizer {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = self.state.rc_deref();
    f.debug_struct("Synchronizer")
      .field("pending", &state.batch.len())
      .field("armed", &state.armed)
      .field("closed", &state.closed)
      .finish()
  }
}
