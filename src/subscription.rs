//! Subscription handles.
//!
//! A [`Subscription`] is a control handle: it is stored, moved and finally
//! consumed by `unsubscribe`. Wrap one in a [`SubscriptionGuard`] to tie its
//! release to a scope.

use std::fmt::{Debug, Formatter};

/// Handle returned by every subscribe-like call in this crate.
pub trait Subscription {
  /// Release whatever the subscription holds. Consumes the handle.
  fn unsubscribe(self);

  fn is_closed(&self) -> bool;

  /// Activates "RAII" behavior for this subscription. `unsubscribe()` is
  /// called as soon as the returned guard goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `unsubscribe()` is called immediately, which is probably not what you
  /// want!
  fn unsubscribe_when_dropped(self) -> SubscriptionGuard<Self>
  where
    Self: Sized,
  {
    SubscriptionGuard::new(self)
  }
}

/// Teardown of a source push channel.
///
/// Returned by the `subscribe` callback given to
/// [`SubjectOptions::subscribe`](crate::subject::SubjectOptions::subscribe);
/// the subject runs it when the channel is closed.
pub struct Teardown(Option<Box<dyn FnOnce()>>);

impl Teardown {
  pub fn new(f: impl FnOnce() + 'static) -> Self { Self(Some(Box::new(f))) }

  /// A teardown with nothing to release.
  pub fn noop() -> Self { Self(None) }
}

impl Subscription for Teardown {
  fn unsubscribe(mut self) {
    if let Some(f) = self.0.take() {
      f()
    }
  }

  fn is_closed(&self) -> bool { self.0.is_none() }
}

impl Debug for Teardown {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Teardown")
      .field("is_closed", &self.is_closed())
      .finish()
  }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you want to drop it immediately, wrap it in its own scope
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard<T: Subscription>(Option<T>);

impl<T: Subscription> SubscriptionGuard<T> {
  /// Wraps an existing subscription with a guard to enable RAII behavior for
  /// it.
  pub fn new(subscription: T) -> SubscriptionGuard<T> { SubscriptionGuard(Some(subscription)) }
}

impl<T: Subscription> Drop for SubscriptionGuard<T> {
  #[inline]
  fn drop(&mut self) {
    if let Some(subscription) = self.0.take() {
      subscription.unsubscribe()
    }
  }
}

#[cfg(test)]
mod test {
  use std::{cell::Cell, rc::Rc};

  use super::*;

  #[external_subject_macro::test]
  fn teardown_runs_once() {
    let hits = Rc::new(Cell::new(0));
    let c_hits = hits.clone();
    let teardown = Teardown::new(move || c_hits.set(c_hits.get() + 1));
    assert!(!teardown.is_closed());
    teardown.unsubscribe();
    assert_eq!(hits.get(), 1);
    assert!(Teardown::noop().is_closed());
  }

  #[external_subject_macro::test]
  fn guard_unsubscribes_on_drop() {
    let hits = Rc::new(Cell::new(0));
    let c_hits = hits.clone();
    {
      let _guard = Teardown::new(move || c_hits.set(c_hits.get() + 1)).unsubscribe_when_dropped();
      assert_eq!(hits.get(), 0);
    }
    assert_eq!(hits.get(), 1);
  }
}
