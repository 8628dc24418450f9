//! Example: Custom Scheduler Injection
//!
//! A synchronizer only needs a [`Scheduler`] to decide when a batch of
//! resolutions flushes. Here we define one that logs every task and runs it
//! at the end of the current "frame", then drive a subject through it.

use std::{
  cell::{Cell, RefCell},
  collections::VecDeque,
  rc::Rc,
};

use external_subject::{prelude::*, scheduler::Task};

// ==================================================================================
// 1. Define the Custom Scheduler
// ==================================================================================

/// Queues tasks until the end of the frame, printing as it goes.
#[derive(Clone, Default)]
pub struct FrameScheduler {
  queue: Rc<RefCell<VecDeque<Task>>>,
}

impl FrameScheduler {
  fn end_frame(&self) {
    println!("[FrameScheduler] End of frame, {} task(s) queued", self.queue.borrow().len());
    loop {
      let task = self.queue.borrow_mut().pop_front();
      let Some(task) = task else { break };
      task();
    }
  }
}

// 2. Implement Scheduler
impl Scheduler for FrameScheduler {
  fn schedule(&self, task: Task) {
    println!("[FrameScheduler] Task scheduled");
    self.queue.borrow_mut().push_back(task);
  }
}

// ==================================================================================
// 3. Usage
// ==================================================================================

fn main() {
  println!("--- Starting Custom Scheduler Example ---");

  let temperature = Rc::new(Cell::new(20));
  let c_temperature = temperature.clone();
  let subject = SubjectOptions::new(move || c_temperature.get()).build();

  let frames = FrameScheduler::default();
  let scope = ObservationScope::new(frames.clone());
  let mut gauge = ObserverBinding::new(subject.clone(), false, || {
    println!("Gauge notified, re-render requested");
  });

  scope.run(|| println!("Gauge shows {:?}", gauge.activate()));

  // Several writes within one frame end up as one refresh.
  for t in 21..=25 {
    temperature.set(t);
    subject.request_update();
  }
  println!("Cache before frame end: {}", subject.get_cached_value());

  frames.end_frame();
  println!("Cache after frame end: {}", subject.get_cached_value());
  scope.run(|| println!("Gauge shows {:?}", gauge.activate()));

  println!("--- Example Finished ---");
}
