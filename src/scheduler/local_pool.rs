use std::{cell::Cell, rc::Rc};

use futures::{executor::LocalSpawner, task::LocalSpawnExt};

use super::{Scheduler, Task};

/// Spawns tasks onto a `futures` [`LocalPool`](futures::executor::LocalPool).
///
/// Tasks run the next time the pool is driven (`run`, `run_until`,
/// `run_until_stalled`). If the pool is gone the task runs inline instead, so
/// no update request is left unresolved.
#[derive(Clone)]
pub struct LocalPoolScheduler {
  spawner: LocalSpawner,
}

impl LocalPoolScheduler {
  pub fn new(spawner: LocalSpawner) -> Self { Self { spawner } }
}

impl Scheduler for LocalPoolScheduler {
  fn schedule(&self, task: Task) {
    let slot = Rc::new(Cell::new(Some(task)));
    let c_slot = slot.clone();
    let spawned = self.spawner.spawn_local(async move {
      if let Some(task) = c_slot.take() {
        task()
      }
    });
    if let Err(err) = spawned {
      tracing::warn!(%err, "local pool unavailable, running task inline");
      if let Some(task) = slot.take() {
        task()
      }
    }
  }
}

#[cfg(test)]
mod test {
  use std::{cell::RefCell, rc::Rc};

  use futures::executor::LocalPool;

  use super::*;

  #[external_subject_macro::test]
  fn runs_when_pool_is_driven() {
    let mut pool = LocalPool::new();
    let scheduler = LocalPoolScheduler::new(pool.spawner());
    let log = Rc::new(RefCell::new(vec![]));

    for i in 0..3 {
      let c_log = log.clone();
      scheduler.schedule(Box::new(move || c_log.borrow_mut().push(i)));
    }
    assert!(log.borrow().is_empty());

    pool.run_until_stalled();
    assert_eq!(*log.borrow(), vec![0, 1, 2]);
  }

  #[external_subject_macro::test]
  fn falls_back_inline_without_pool() {
    let pool = LocalPool::new();
    let scheduler = LocalPoolScheduler::new(pool.spawner());
    drop(pool);

    let hit = Rc::new(Cell::new(false));
    let c_hit = hit.clone();
    scheduler.schedule(Box::new(move || c_hit.set(true)));
    assert!(hit.get());
  }
}
