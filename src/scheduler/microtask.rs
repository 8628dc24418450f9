use super::{Scheduler, Task};

/// Queues tasks on the JavaScript microtask queue through
/// `wasm_bindgen_futures::spawn_local`, the closest match to a browser
/// host's "after the current unit of work".
#[derive(Clone, Copy, Debug, Default)]
pub struct MicrotaskScheduler;

impl Scheduler for MicrotaskScheduler {
  fn schedule(&self, task: Task) { wasm_bindgen_futures::spawn_local(async move { task() }); }
}
