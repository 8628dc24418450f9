//! Per-observer tear checking.
//!
//! An [`ObserverBinding`] is what a host keeps for every observer mounted on
//! an [`ExternalSubject`]. The host calls [`ObserverBinding::activate`] on
//! every mount and re-render and hands the binding a callback that schedules
//! a re-render; the binding decides whether the observer may show a value or
//! has to wait for the subject's next snapshot.
//!
//! ## States
//!
//! ```text
//! Initial ──activate──▶ Subscribed ──tear check──▶ Stable | Suspended
//!    ▲                                                 │
//!    └─────────────────── deactivate ◀─────────────────┘
//! ```
//!
//! Every activation checks for tearing. A stable activation also schedules a
//! deferred re-check, so a mutation made later in the same pass (after this
//! observer already read) is still caught once the pass commits.
//!
//! Bindings sharing a [`SuspenseBoundary`] suspend together: an observer that
//! already rendered is moved to `Suspended` when a later one in the same
//! boundary hits a tear.

use std::{cell::Cell, rc::Rc};

use crate::{
  boundary::SuspenseBoundary,
  error::ObserveError,
  subject::{ExternalSubject, ListenerSubscription},
  subscription::{Subscription, SubscriptionGuard},
  synchronizer::Synchronizer,
};

/// Where a binding is in its activation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
  /// Not mounted, or deactivated.
  Initial,
  /// Listening to the subject; the tear check has not run yet.
  Subscribed,
  /// The last activation saw a consistent snapshot.
  Stable,
  /// The last activation found an update request in flight.
  Suspended,
}

/// The observer side of an [`ExternalSubject`].
///
/// With `suspense` on, a tear makes [`activate`](Self::activate) fail with
/// [`ObserveError::Suspended`]; the host parks the observer and activates it
/// again once the carried resolution settles. With `suspense` off, the
/// observer keeps showing the stale snapshot and `on_change` fires once the
/// subject resolves, so the host re-renders it.
///
/// # Example
///
/// ```rust
/// use std::{cell::Cell, rc::Rc};
///
/// use external_subject::{prelude::*, scheduler::ManualScheduler};
///
/// let source = Rc::new(Cell::new(0));
/// let c_source = source.clone();
/// let subject = SubjectOptions::new(move || c_source.get()).build();
///
/// let commit = ManualScheduler::new();
/// let scope = ObservationScope::new(commit.clone());
/// let dirty = Rc::new(Cell::new(false));
/// let c_dirty = dirty.clone();
/// let mut binding = ObserverBinding::new(subject, false, move || c_dirty.set(true));
///
/// let _guard = scope.enter();
/// assert_eq!(binding.activate().unwrap(), 0);
/// source.set(1337);
/// commit.run_until_idle();
///
/// assert!(dirty.get());
/// assert_eq!(binding.activate().unwrap(), 1337);
/// ```
pub struct ObserverBinding<T> {
  subject: ExternalSubject<T>,
  suspense: bool,
  on_change: Rc<dyn Fn()>,
  synchronizer: Option<Synchronizer>,
  boundary: Option<SuspenseBoundary>,
  membership: Option<usize>,
  subscription: Option<SubscriptionGuard<ListenerSubscription>>,
  state: Rc<Cell<BindingState>>,
}

impl<T: Clone + 'static> ObserverBinding<T> {
  pub fn new(subject: ExternalSubject<T>, suspense: bool, on_change: impl Fn() + 'static) -> Self {
    Self {
      subject,
      suspense,
      on_change: Rc::new(on_change),
      synchronizer: None,
      boundary: None,
      membership: None,
      subscription: None,
      state: Rc::new(Cell::new(BindingState::Initial)),
    }
  }

  /// Use `synchronizer` instead of looking one up in the current
  /// [`ObservationScope`](crate::scope::ObservationScope).
  pub fn with_synchronizer(mut self, synchronizer: Synchronizer) -> Self {
    self.synchronizer = Some(synchronizer);
    self
  }

  /// Suspend and resume together with the other members of `boundary`.
  pub fn with_boundary(mut self, boundary: SuspenseBoundary) -> Self {
    self.boundary = Some(boundary);
    self
  }

  /// Mount or re-render the observer.
  ///
  /// Binds the synchronizer, subscribes on first activation, then runs the
  /// tear check:
  ///
  /// - a request already in flight, or one opened by this check, means the
  ///   observer must wait: `Err(Suspended)` with `suspense`, the stale cached
  ///   value without;
  /// - otherwise the live value is returned and a deferred re-check is
  ///   scheduled, unless a suspense binding's boundary is still waiting, in
  ///   which case it suspends on the boundary's resolution.
  pub fn activate(&mut self) -> Result<T, ObserveError> {
    if self.subject.is_destroyed() {
      self.deactivate();
      return Err(ObserveError::Destroyed);
    }

    if let Some(synchronizer) = self
      .synchronizer
      .clone()
      .or_else(Synchronizer::try_current)
    {
      self.subject.set_synchronizer(&synchronizer);
    }

    if self.subscription.is_none() {
      let on_change = self.on_change.clone();
      let subscription = self.subject.subscribe(move || on_change());
      self.subscription = Some(subscription.unsubscribe_when_dropped());
      self.state.set(BindingState::Subscribed);
      if let Some(boundary) = &self.boundary {
        let id = boundary.join(self.suspense, self.state.clone(), self.on_change.clone());
        self.membership = Some(id);
      }
    }

    let pending = self.subject.get_request().or_else(|| {
      self.subject.request_update();
      self.subject.get_request()
    });

    match pending {
      Some(request) => {
        self.state.set(BindingState::Suspended);
        tracing::trace!(request = request.id(), suspense = self.suspense, "observer waiting");
        if !self.suspense {
          return Ok(self.subject.get_cached_value());
        }
        let resolution = request.resolution();
        if let Some(boundary) = &self.boundary {
          boundary.suspend(&resolution);
        }
        Err(ObserveError::Suspended(resolution))
      }
      None => {
        self.subject.request_update_deferred();
        let held = self
          .boundary
          .as_ref()
          .filter(|_| self.suspense)
          .and_then(SuspenseBoundary::resolution);
        match held {
          Some(resolution) => {
            self.state.set(BindingState::Suspended);
            Err(ObserveError::Suspended(resolution))
          }
          None => {
            self.state.set(BindingState::Stable);
            Ok(self.subject.get_current_value())
          }
        }
      }
    }
  }

  /// Activate until a settled snapshot is available, awaiting every pending
  /// update request on the way. Works the same with or without `suspense`.
  ///
  /// The future only completes if the scheduler resolving the subject keeps
  /// running while it is awaited.
  pub async fn observe_settled(&mut self) -> Result<T, ObserveError> {
    loop {
      match self.activate() {
        Err(ObserveError::Suspended(resolution)) => resolution.await,
        Ok(value) => match self.subject.get_request() {
          Some(request) if self.state() == BindingState::Suspended => request.resolution().await,
          _ => return Ok(value),
        },
        Err(err) => return Err(err),
      }
    }
  }

  /// Unmount: release the subscription.
  pub fn deactivate(&mut self) {
    if let Some(subscription) = self.subscription.take() {
      drop(subscription);
      tracing::trace!("observer deactivated");
    }
    if let (Some(boundary), Some(id)) = (&self.boundary, self.membership.take()) {
      boundary.leave(id);
    }
    self.state.set(BindingState::Initial);
  }

  pub fn state(&self) -> BindingState { self.state.get() }

  pub fn is_active(&self) -> bool { self.subscription.is_some() && !self.subject.is_destroyed() }

  pub fn subject(&self) -> &ExternalSubject<T> { &self.subject }

  pub fn suspense(&self) -> bool { self.suspense }
}

impl<T> Drop for ObserverBinding<T> {
  fn drop(&mut self) {
    if let (Some(boundary), Some(id)) = (&self.boundary, self.membership.take()) {
      boundary.leave(id);
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{scheduler::ManualScheduler, scope::ObservationScope, subject::SubjectOptions};

  fn subject(source: &Rc<Cell<i32>>) -> ExternalSubject<i32> {
    let c_source = source.clone();
    SubjectOptions::new(move || c_source.get()).build()
  }

  fn flag() -> (Rc<Cell<bool>>, impl Fn() + 'static) {
    let flag = Rc::new(Cell::new(false));
    let c_flag = flag.clone();
    (flag, move || c_flag.set(true))
  }

  #[external_subject_macro::test]
  fn stable_activation() {
    let source = Rc::new(Cell::new(3));
    let (_, on_change) = flag();
    let sync_commit = ManualScheduler::new();
    let mut binding = ObserverBinding::new(subject(&source), false, on_change)
      .with_synchronizer(Synchronizer::new(sync_commit.clone()));
    assert_eq!(binding.state(), BindingState::Initial);

    assert_eq!(binding.activate().unwrap(), 3);
    assert_eq!(binding.state(), BindingState::Stable);
    assert!(binding.is_active());
    assert_eq!(binding.subject().listener_count(), 1);

    // Re-activation does not subscribe twice.
    assert_eq!(binding.activate().unwrap(), 3);
    assert_eq!(binding.subject().listener_count(), 1);
  }

  #[external_subject_macro::test]
  fn suspense_waits_for_resolution() {
    let source = Rc::new(Cell::new(0));
    let commit = ManualScheduler::new();
    let scope = ObservationScope::new(commit.clone());
    let subject = subject(&source);
    subject.get_cached_value();
    let (_, on_change) = flag();
    let mut binding = ObserverBinding::new(subject, true, on_change);

    let _guard = scope.enter();
    source.set(1);
    let resolution = match binding.activate() {
      Err(ObserveError::Suspended(resolution)) => resolution,
      other => panic!("expected suspension, got {other:?}"),
    };
    assert_eq!(binding.state(), BindingState::Suspended);

    // Still waiting on re-activation before the flush.
    assert!(binding.activate().unwrap_err().is_suspended());

    commit.run_until_idle();
    assert!(resolution.is_settled());
    assert_eq!(binding.activate().unwrap(), 1);
    assert_eq!(binding.state(), BindingState::Stable);
  }

  #[external_subject_macro::test]
  fn without_suspense_stale_value_then_notification() {
    let source = Rc::new(Cell::new(0));
    let commit = ManualScheduler::new();
    let subject = subject(&source);
    subject.get_cached_value();
    let (dirty, on_change) = flag();
    let mut binding = ObserverBinding::new(subject, false, on_change)
      .with_synchronizer(Synchronizer::new(commit.clone()));

    source.set(1);
    assert_eq!(binding.activate().unwrap(), 0);
    assert_eq!(binding.state(), BindingState::Suspended);
    assert!(!dirty.get());

    commit.run_until_idle();
    assert!(dirty.get());
    assert_eq!(binding.activate().unwrap(), 1);
  }

  #[external_subject_macro::test]
  fn explicit_synchronizer_beats_scope() {
    let source = Rc::new(Cell::new(0));
    let explicit = Synchronizer::immediate();
    let scope = ObservationScope::new(ManualScheduler::new());
    let (_, on_change) = flag();
    let mut binding =
      ObserverBinding::new(subject(&source), false, on_change).with_synchronizer(explicit.clone());

    scope.run(|| binding.activate()).unwrap();
    assert!(binding.subject().synchronizer().unwrap().ptr_eq(&explicit));
  }

  #[external_subject_macro::test]
  fn binds_scope_synchronizer() {
    let source = Rc::new(Cell::new(0));
    let scope = ObservationScope::new(ManualScheduler::new());
    let (_, on_change) = flag();
    let mut binding = ObserverBinding::new(subject(&source), false, on_change);

    scope.run(|| binding.activate()).unwrap();
    assert!(binding
      .subject()
      .synchronizer()
      .unwrap()
      .ptr_eq(scope.synchronizer()));
  }

  #[external_subject_macro::test]
  fn deactivate_and_drop_release_subscription() {
    let source = Rc::new(Cell::new(0));
    let subject = subject(&source);
    let (_, on_change) = flag();
    let mut a = ObserverBinding::new(subject.clone(), false, on_change);
    let (_, on_change) = flag();
    let mut b = ObserverBinding::new(subject.clone(), false, on_change);
    a.activate().unwrap();
    b.activate().unwrap();
    assert_eq!(subject.listener_count(), 2);

    a.deactivate();
    assert_eq!(a.state(), BindingState::Initial);
    assert!(!a.is_active());
    assert_eq!(subject.listener_count(), 1);

    drop(b);
    assert_eq!(subject.listener_count(), 0);
  }

  #[external_subject_macro::test]
  fn destroyed_subject_is_an_error() {
    let source = Rc::new(Cell::new(0));
    let subject = subject(&source);
    let (_, on_change) = flag();
    let mut binding = ObserverBinding::new(subject.clone(), true, on_change);
    binding.activate().unwrap();

    subject.destroy();
    assert!(matches!(binding.activate(), Err(ObserveError::Destroyed)));
    assert_eq!(binding.state(), BindingState::Initial);
  }

  #[external_subject_macro::test]
  fn deferred_recheck_catches_later_mutation() {
    let source = Rc::new(Cell::new(0));
    let commit = ManualScheduler::new();
    let (dirty, on_change) = flag();
    let mut binding = ObserverBinding::new(subject(&source), false, on_change)
      .with_synchronizer(Synchronizer::new(commit.clone()));

    assert_eq!(binding.activate().unwrap(), 0);
    // Mutated after this observer already read, within the same pass.
    source.set(1);
    assert!(!dirty.get());

    commit.run_until_idle();
    assert!(dirty.get());
    assert_eq!(binding.subject().get_cached_value(), 1);
  }

  #[external_subject_macro::test]
  fn boundary_suspends_observers_that_already_rendered() {
    let source = Rc::new(Cell::new(0));
    let commit = ManualScheduler::new();
    let scope = ObservationScope::new(commit.clone());
    let subject = subject(&source);
    subject.get_cached_value();
    let boundary = SuspenseBoundary::new();
    let (a_dirty, on_change) = flag();
    let mut a =
      ObserverBinding::new(subject.clone(), true, on_change).with_boundary(boundary.clone());
    let (b_dirty, on_change) = flag();
    let mut b = ObserverBinding::new(subject, true, on_change).with_boundary(boundary.clone());

    let _guard = scope.enter();
    assert_eq!(a.activate().unwrap(), 0);
    source.set(1337);
    assert!(b.activate().unwrap_err().is_suspended());
    assert_eq!(boundary.member_count(), 2);
    assert!(boundary.is_suspended());
    assert_eq!(a.state(), BindingState::Suspended);
    assert_eq!(b.state(), BindingState::Suspended);
    assert!(a.activate().unwrap_err().is_suspended());

    commit.run_until_idle();
    assert!(!boundary.is_suspended());
    assert!(a_dirty.get() && b_dirty.get());
    assert_eq!(a.activate().unwrap(), 1337);
    assert_eq!(b.activate().unwrap(), 1337);
    assert_eq!(a.state(), BindingState::Stable);

    a.deactivate();
    drop(b);
    assert_eq!(boundary.member_count(), 0);
  }
}
