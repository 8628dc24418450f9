use std::collections::VecDeque;

use super::{Scheduler, Task};
use crate::rc::{MutRc, RcDeref, RcDerefMut};

/// A scheduler the host drains explicitly.
///
/// Tasks queue up until [`ManualScheduler::run_until_idle`] (or
/// [`ManualScheduler::run_next`]) is called. A UI host calls it from its
/// effect-commit phase; tests call it to step deterministically through a
/// pass. Clones share one queue.
///
/// # Usage
///
/// ```rust
/// use std::{cell::Cell, rc::Rc};
///
/// use external_subject::scheduler::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::default();
/// let hit = Rc::new(Cell::new(false));
/// let c_hit = hit.clone();
/// scheduler.schedule(Box::new(move || c_hit.set(true)));
///
/// assert!(!hit.get());
/// assert_eq!(scheduler.run_until_idle(), 1);
/// assert!(hit.get());
/// ```
#[derive(Clone, Default)]
pub struct ManualScheduler {
  queue: MutRc<VecDeque<Task>>,
}

impl ManualScheduler {
  pub fn new() -> Self { Self::default() }

  pub fn pending_count(&self) -> usize { self.queue.rc_deref().len() }

  pub fn is_idle(&self) -> bool { self.queue.rc_deref().is_empty() }

  /// Run the oldest queued task. Returns `false` if the queue was empty.
  pub fn run_next(&self) -> bool {
    let task = self.queue.rc_deref_mut().pop_front();
    match task {
      Some(task) => {
        task();
        true
      }
      None => false,
    }
  }

  /// Run tasks until the queue is empty, including tasks scheduled by the
  /// tasks being run. Returns how many ran.
  pub fn run_until_idle(&self) -> usize {
    let mut ran = 0;
    while self.run_next() {
      ran += 1;
    }
    ran
  }
}

impl Scheduler for ManualScheduler {
  fn schedule(&self, task: Task) { self.queue.rc_deref_mut().push_back(task); }
}
