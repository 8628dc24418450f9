//! Update requests and their resolution tokens.
//!
//! An [`UpdateRequest`] is opened by a subject the moment its cache and its
//! live value disagree. Observers that must wait for the new snapshot suspend
//! on the request's [`Resolution`], which settles once the request resolves.
//!
//! ## Lifecycle
//!
//! - **alive**: freshly opened, its resolution is scheduled.
//! - **superseded**: a newer mismatch opened a successor. The request is dead
//!   and will never touch the cache or notify anyone. Its resolution is
//!   chained to the successor's and settles together with it.
//! - **resolved**: its scheduled resolution ran while it was still alive. The
//!   request is dead and its resolution settled.
//!
//! A resolution always settles eventually: by resolving, by following its
//! successor, or when the owning subject is destroyed.

use std::{
  cell::Cell,
  fmt::{Debug, Formatter},
  future::Future,
  pin::Pin,
  rc::Rc,
  task::{Context, Poll, Waker},
};

use smallvec::SmallVec;

use crate::rc::{MutRc, RcDeref, RcDerefMut};

// ============================================================================
// Resolution
// ============================================================================

#[derive(Default)]
struct ResolutionState {
  settled: bool,
  wakers: SmallVec<[Waker; 1]>,
  callbacks: Vec<Box<dyn FnOnce()>>,
  followers: SmallVec<[Resolution; 1]>,
}

/// Awaitable token that settles when an update request is no longer pending.
///
/// Hosts either `.await` it (it is a `Future<Output = ()>`) or register a
/// retry callback with [`Resolution::on_settle`]. Clones share one state.
#[derive(Clone)]
pub struct Resolution(MutRc<ResolutionState>);

impl Resolution {
  pub(crate) fn new() -> Self { Self(MutRc::own(ResolutionState::default())) }

  pub fn is_settled(&self) -> bool { self.0.rc_deref().settled }

  /// Run `f` once this resolution settles, or right away if it already has.
  pub fn on_settle(&self, f: impl FnOnce() + 'static) {
    {
      let mut state = self.0.rc_deref_mut();
      if !state.settled {
        state.callbacks.push(Box::new(f));
        return;
      }
    }
    f()
  }

  /// Whether both handles point at the same token.
  pub fn ptr_eq(&self, other: &Self) -> bool { self.0.ptr_eq(&other.0) }

  /// Settle the token: wake pending futures, run callbacks, then settle every
  /// follower. Settling twice is a no-op.
  pub(crate) fn settle(&self) {
    let (wakers, callbacks, followers) = {
      let mut state = self.0.rc_deref_mut();
      if state.settled {
        return;
      }
      state.settled = true;
      (
        std::mem::take(&mut state.wakers),
        std::mem::take(&mut state.callbacks),
        std::mem::take(&mut state.followers),
      )
    };
    wakers.into_iter().for_each(Waker::wake);
    callbacks.into_iter().for_each(|f| f());
    followers.iter().for_each(Resolution::settle);
  }

  /// Make `follower` settle together with `self`.
  pub(crate) fn forward_to(&self, follower: Resolution) {
    {
      let mut state = self.0.rc_deref_mut();
      if !state.settled {
        state.followers.push(follower);
        return;
      }
    }
    follower.settle()
  }
}

impl Future for Resolution {
  type Output = ();

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    let mut state = self.0.rc_deref_mut();
    if state.settled {
      return Poll::Ready(());
    }
    if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
      state.wakers.push(cx.waker().clone());
    }
    Poll::Pending
  }
}

impl Debug for Resolution {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Resolution")
      .field("settled", &self.is_settled())
      .finish()
  }
}

// ============================================================================
// UpdateRequest
// ============================================================================

struct RequestInner {
  id: u64,
  alive: Cell<bool>,
  resolution: Resolution,
}

/// A single-flight revalidation opened by a subject.
///
/// Liveness is the only cancellation primitive: code holding a request must
/// check [`UpdateRequest::is_alive`] before mutating shared state.
#[derive(Clone)]
pub struct UpdateRequest(Rc<RequestInner>);

impl UpdateRequest {
  pub(crate) fn new(id: u64) -> Self {
    Self(Rc::new(RequestInner { id, alive: Cell::new(true), resolution: Resolution::new() }))
  }

  /// Sequence number of this request within its subject.
  pub fn id(&self) -> u64 { self.0.id }

  pub fn is_alive(&self) -> bool { self.0.alive.get() }

  /// The token observers suspend on.
  pub fn resolution(&self) -> Resolution { self.0.resolution.clone() }

  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

  /// Mark the request dead. Returns whether it was alive.
  pub(crate) fn kill(&self) -> bool { self.0.alive.replace(false) }

  /// Kill this request in favour of `successor`; this request's resolution
  /// will settle when the successor's does.
  pub(crate) fn supersede(&self, successor: &UpdateRequest) {
    self.kill();
    successor.0.resolution.forward_to(self.resolution());
  }
}

impl Debug for UpdateRequest {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("UpdateRequest")
      .field("id", &self.id())
      .field("alive", &self.is_alive())
      .field("resolution", &self.0.resolution)
      .finish()
  }
}
