//! Property tests for the subject's request bookkeeping and for tear-free
//! render passes over arbitrary mixes of readers and effects.

#![cfg(not(target_arch = "wasm32"))]

use std::{cell::Cell, rc::Rc};

use external_subject::prelude::*;
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
  Write(i32),
  Check,
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![(0i32..4).prop_map(Op::Write), Just(Op::Check)]
}

#[derive(Clone, Debug)]
enum Node {
  Read { suspense: bool },
  Effect(i32),
}

fn node() -> impl Strategy<Value = Node> {
  prop_oneof![
    any::<bool>().prop_map(|suspense| Node::Read { suspense }),
    (0i32..4).prop_map(Node::Effect),
  ]
}

fn counted_subject(
  source: &Rc<Cell<i32>>, commit: &ManualScheduler,
) -> (ExternalSubject<i32>, Rc<Cell<usize>>, ListenerSubscription) {
  let c_source = source.clone();
  let subject = SubjectOptions::new(move || c_source.get())
    .synchronizer(Synchronizer::new(commit.clone()))
    .build();
  let notified = Rc::new(Cell::new(0));
  let c_notified = notified.clone();
  let listener = subject.subscribe(move || c_notified.set(c_notified.get() + 1));
  (subject, notified, listener)
}

proptest! {
  /// Whatever the interleaving of writes and checks, at most one request is
  /// alive, and one flush leaves the cache current after one notification.
  #[test]
  fn single_flight(ops in proptest::collection::vec(op(), 0..40)) {
    let source = Rc::new(Cell::new(0));
    let commit = ManualScheduler::new();
    let (subject, notified, _listener) = counted_subject(&source, &commit);
    subject.get_cached_value();

    let mut seen: Vec<UpdateRequest> = vec![];
    for op in &ops {
      match op {
        Op::Write(v) => source.set(*v),
        Op::Check => {
          subject.request_update();
          if let Some(request) = subject.get_request() {
            if !seen.iter().any(|r| r.ptr_eq(&request)) {
              seen.push(request);
            }
          }
        }
      }
      prop_assert!(seen.iter().filter(|r| r.is_alive()).count() <= 1);
      prop_assert_eq!(subject.get_cached_value(), 0);
    }

    commit.run_until_idle();
    prop_assert!(subject.get_request().is_none());
    prop_assert!(seen.iter().all(|r| !r.is_alive() && r.resolution().is_settled()));
    prop_assert_eq!(notified.get(), usize::from(!seen.is_empty()));
    if !seen.is_empty() {
      prop_assert_eq!(subject.get_cached_value(), source.get());
    }
  }

  /// Checking an unchanged source never opens a request or schedules work.
  #[test]
  fn unchanged_source_is_a_noop(value in any::<i32>(), checks in 1usize..20) {
    let source = Rc::new(Cell::new(value));
    let commit = ManualScheduler::new();
    let (subject, notified, _listener) = counted_subject(&source, &commit);

    for _ in 0..checks {
      subject.request_update();
    }
    prop_assert!(subject.get_request().is_none());
    prop_assert!(commit.is_idle());
    prop_assert_eq!(notified.get(), 0);
    prop_assert_eq!(subject.get_cached_value(), value);
  }

  /// No committed pass shows two readers with different values, and the
  /// passes converge on the source's final value.
  #[test]
  fn render_passes_never_tear(nodes in proptest::collection::vec(node(), 1..12)) {
    let source = Rc::new(Cell::new(-1));
    let c_source = source.clone();
    let subject = SubjectOptions::new(move || c_source.get()).build();
    let commit = ManualScheduler::new();
    let scope = ObservationScope::new(commit.clone());

    let mut readers: Vec<_> = nodes
      .iter()
      .map(|node| match node {
        Node::Read { suspense } => {
          let dirty = Rc::new(Cell::new(false));
          let c_dirty = dirty.clone();
          let binding = ObserverBinding::new(subject.clone(), *suspense, move || c_dirty.set(true));
          Some((binding, dirty, None::<i32>))
        }
        Node::Effect(_) => None,
      })
      .collect();

    for pass in 0..16 {
      let mount = pass == 0;
      scope.run(|| {
        for (node, reader) in nodes.iter().zip(readers.iter_mut()) {
          match (node, reader) {
            (Node::Effect(v), _) if mount => source.set(*v),
            (Node::Read { .. }, Some((binding, dirty, shown))) => {
              let dirty = dirty.replace(false);
              let retry = binding.state() == BindingState::Suspended
                && binding.subject().get_request().is_none();
              if mount || dirty || retry {
                *shown = binding.activate().ok();
              }
            }
            _ => {}
          }
        }
      });

      let shown: Vec<i32> = readers.iter().flatten().filter_map(|(_, _, s)| *s).collect();
      prop_assert!(shown.windows(2).all(|w| w[0] == w[1]), "torn commit: {:?}", shown);
      commit.run_until_idle();

      let idle = readers.iter().flatten().all(|(binding, dirty, _)| {
        !dirty.get() && binding.state() != BindingState::Suspended
      });
      if idle {
        break;
      }
    }

    for (binding, _, shown) in readers.iter().flatten() {
      prop_assert_eq!(binding.state(), BindingState::Stable);
      prop_assert_eq!(*shown, Some(source.get()));
    }
  }
}
