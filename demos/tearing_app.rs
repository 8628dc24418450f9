//! Example: a render pass that would tear
//!
//! Two observers read the same global counter. Between them an effectful
//! component bumps the counter from 0 to 1337 in the middle of the pass.
//! Observer A does not suspend and keeps showing the old snapshot; observer B
//! suspends. Once the pass commits, the synchronizer refreshes the subject
//! and both observers show 1337 together. No committed pass ever shows 0 next
//! to 1337.

use std::{cell::Cell, rc::Rc};

use external_subject::prelude::*;

fn show(name: &str, value: &Result<i32, ObserveError>) {
  match value {
    Ok(v) => println!("  {name}: Value: {v}"),
    Err(ObserveError::Suspended(_)) => println!("  {name}: (suspended)"),
    Err(err) => println!("  {name}: {err}"),
  }
}

fn main() {
  let source = Rc::new(Cell::new(0));
  let c_source = source.clone();
  let subject = SubjectOptions::new(move || c_source.get()).build();

  // The manual scheduler stands in for the host's commit phase.
  let commit = ManualScheduler::new();
  let scope = ObservationScope::new(commit.clone());
  let mut observer_a = ObserverBinding::new(subject.clone(), false, || {});
  let mut observer_b = ObserverBinding::new(subject.clone(), true, || {});

  let render = |a: &mut ObserverBinding<i32>, b: &mut ObserverBinding<i32>, effect: bool| {
    scope.run(|| {
      let a = a.activate();
      show("ObserverA", &a);
      if effect {
        source.set(1337);
        println!("  Effectful: {}", source.get());
      }
      show("ObserverB", &b.activate());
    })
  };

  println!("pass 1");
  render(&mut observer_a, &mut observer_b, true);
  println!("commit: {} task(s)", commit.run_until_idle());

  println!("pass 2");
  render(&mut observer_a, &mut observer_b, false);
  commit.run_until_idle();
}
