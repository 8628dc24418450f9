//! Suspense boundaries.
//!
//! A host usually hides a whole group of observers while any one of them is
//! waiting, instead of showing the ready ones next to a placeholder. A
//! [`SuspenseBoundary`] is that group. Bindings join it with
//! [`ObserverBinding::with_boundary`](crate::binding::ObserverBinding::with_boundary);
//! once a suspense member suspends, every suspense member counts as suspended
//! on the same resolution, including those that already rendered in this pass.
//! When the last pending resolution settles, every member's change callback
//! fires so the host renders the group again.

use std::{
  cell::Cell,
  fmt::{Debug, Formatter},
  rc::Rc,
};

use smallvec::SmallVec;

use crate::{
  binding::BindingState,
  rc::{MutRc, RcDeref, RcDerefMut},
  request::Resolution,
};

struct Member {
  suspense: bool,
  state: Rc<Cell<BindingState>>,
  on_change: Rc<dyn Fn()>,
}

#[derive(Default)]
struct BoundaryState {
  next_id: usize,
  members: SmallVec<[(usize, Member); 2]>,
  pending: SmallVec<[Resolution; 1]>,
}

/// A group of observers that suspend and resume together.
///
/// Clones share one boundary.
#[derive(Clone, Default)]
pub struct SuspenseBoundary(MutRc<BoundaryState>);

impl SuspenseBoundary {
  pub fn new() -> Self { Self::default() }

  /// Whether some member is waiting on an unsettled resolution.
  pub fn is_suspended(&self) -> bool {
    self
      .0
      .rc_deref()
      .pending
      .iter()
      .any(|r| !r.is_settled())
  }

  /// The oldest unsettled resolution the boundary waits on.
  pub fn resolution(&self) -> Option<Resolution> {
    self
      .0
      .rc_deref()
      .pending
      .iter()
      .find(|r| !r.is_settled())
      .cloned()
  }

  pub fn member_count(&self) -> usize { self.0.rc_deref().members.len() }

  pub fn ptr_eq(&self, other: &Self) -> bool { self.0.ptr_eq(&other.0) }

  pub(crate) fn join(
    &self, suspense: bool, state: Rc<Cell<BindingState>>, on_change: Rc<dyn Fn()>,
  ) -> usize {
    let mut inner = self.0.rc_deref_mut();
    let id = inner.next_id;
    inner.next_id += 1;
    inner
      .members
      .push((id, Member { suspense, state, on_change }));
    id
  }

  pub(crate) fn leave(&self, id: usize) {
    let mut inner = self.0.rc_deref_mut();
    if let Some(pos) = inner.members.iter().position(|(i, _)| *i == id) {
      inner.members.remove(pos);
    }
  }

  /// Suspend every suspense member on `resolution`.
  pub(crate) fn suspend(&self, resolution: &Resolution) {
    let fresh = {
      let mut inner = self.0.rc_deref_mut();
      inner
        .members
        .iter()
        .filter(|(_, m)| m.suspense)
        .for_each(|(_, m)| m.state.set(BindingState::Suspended));
      let known = inner.pending.iter().any(|r| r.ptr_eq(resolution));
      if !known {
        inner.pending.retain(|r| !r.is_settled());
        inner.pending.push(resolution.clone());
      }
      !known
    };
    if fresh {
      tracing::trace!(members = self.member_count(), "suspense boundary suspended");
      let this = self.clone();
      resolution.on_settle(move || this.release());
    }
  }

  fn release(&self) {
    let listeners: SmallVec<[Rc<dyn Fn()>; 2]> = {
      let mut inner = self.0.rc_deref_mut();
      inner.pending.retain(|r| !r.is_settled());
      if !inner.pending.is_empty() {
        return;
      }
      inner
        .members
        .iter()
        .map(|(_, m)| m.on_change.clone())
        .collect()
    };
    tracing::trace!(members = listeners.len(), "suspense boundary released");
    listeners.iter().for_each(|on_change| on_change());
  }
}

impl Debug for SuspenseBoundary {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SuspenseBoundary")
      .field("members", &self.member_count())
      .field("suspended", &self.is_suspended())
      .finish()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn member(
    boundary: &SuspenseBoundary, suspense: bool,
  ) -> (Rc<Cell<BindingState>>, Rc<Cell<usize>>) {
    let state = Rc::new(Cell::new(BindingState::Stable));
    let hits = Rc::new(Cell::new(0));
    let c_hits = hits.clone();
    boundary.join(suspense, state.clone(), Rc::new(move || c_hits.set(c_hits.get() + 1)));
    (state, hits)
  }

  #[external_subject_macro::test]
  fn suspends_members_and_releases_on_last_settle() {
    let boundary = SuspenseBoundary::new();
    let (a, a_hits) = member(&boundary, true);
    let (b, b_hits) = member(&boundary, false);

    let first = Resolution::new();
    let second = Resolution::new();
    boundary.suspend(&first);
    boundary.suspend(&second);
    boundary.suspend(&first);
    assert!(boundary.is_suspended());
    assert_eq!(a.get(), BindingState::Suspended);
    assert_eq!(b.get(), BindingState::Stable);
    assert!(boundary.resolution().is_some_and(|r| r.ptr_eq(&first)));

    first.settle();
    assert!(boundary.is_suspended());
    assert_eq!(a_hits.get(), 0);

    second.settle();
    assert!(!boundary.is_suspended());
    assert!(boundary.resolution().is_none());
    assert_eq!((a_hits.get(), b_hits.get()), (1, 1));
  }

  #[external_subject_macro::test]
  fn departed_members_are_not_called() {
    let boundary = SuspenseBoundary::new();
    let state = Rc::new(Cell::new(BindingState::Stable));
    let id = boundary.join(true, state.clone(), Rc::new(|| panic!("left the boundary")));
    boundary.leave(id);
    assert_eq!(boundary.member_count(), 0);

    let resolution = Resolution::new();
    boundary.suspend(&resolution);
    resolution.settle();
    assert_eq!(state.get(), BindingState::Stable);
  }
}
