//! Deferred execution strategies.
//!
//! A [`Scheduler`] runs a [`Task`] after the current unit of work. It is the
//! only thing this crate needs from the host's event loop: synchronizers use
//! one as their flush trigger, and subjects without a synchronizer use one to
//! resolve their own update requests.
//!
//! | Scheduler | Runs the task |
//! |-----------|---------------|
//! | [`ImmediateScheduler`] | synchronously, inside `schedule` |
//! | [`ManualScheduler`] | when the host drains it (commit hook, tests) |
//! | [`LocalPoolScheduler`] | on a `futures` local executor |
//! | [`TokioLocalScheduler`] | via `tokio::task::spawn_local` |
//! | [`MicrotaskScheduler`] | on the JS microtask queue (wasm32) |

use std::rc::Rc;

mod manual;
pub use manual::ManualScheduler;

#[cfg(feature = "futures-scheduler")]
mod local_pool;
#[cfg(feature = "futures-scheduler")]
pub use local_pool::LocalPoolScheduler;

#[cfg(feature = "tokio-scheduler")]
mod tokio_local;
#[cfg(feature = "tokio-scheduler")]
pub use tokio_local::TokioLocalScheduler;

#[cfg(target_arch = "wasm32")]
mod microtask;
#[cfg(target_arch = "wasm32")]
pub use microtask::MicrotaskScheduler;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Schedules a task to run after the current unit of work.
///
/// Implementations must run every scheduled task exactly once, in the order
/// they were scheduled.
pub trait Scheduler {
  fn schedule(&self, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
  #[inline]
  fn schedule(&self, task: Task) { (**self).schedule(task) }
}

/// Runs tasks right away.
///
/// This is the degenerate strategy: a subject resolving through it refreshes
/// its cache inside `request_update` itself, so nothing is ever left pending.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  #[inline]
  fn schedule(&self, task: Task) { task() }
}
