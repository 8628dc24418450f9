use super::{Scheduler, Task};

/// Spawns tasks with `tokio::task::spawn_local`.
///
/// # Panics
///
/// `schedule` panics when called outside a `tokio::task::LocalSet`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioLocalScheduler;

impl Scheduler for TokioLocalScheduler {
  fn schedule(&self, task: Task) {
    let _handle = tokio::task::spawn_local(async move { task() });
  }
}
