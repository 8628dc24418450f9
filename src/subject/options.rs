use std::rc::Rc;

use super::{ExternalSubject, Notifier};
use crate::{
  scheduler::{ImmediateScheduler, Scheduler},
  subscription::Teardown,
  synchronizer::Synchronizer,
};

pub(crate) type ReadFn<T> = Box<dyn Fn() -> T>;
pub(crate) type SourceSubscribeFn = Box<dyn Fn(Notifier) -> Option<Teardown>>;
pub(crate) type ShouldUpdateFn<T> = Box<dyn Fn(&T, &T) -> bool>;

/// Default comparator: the value changed if it is no longer equal.
///
/// Reflexive even for partial orders: two values that are each unequal to
/// themselves (`f64::NAN`) count as unchanged, so such a source still settles.
#[allow(clippy::eq_op)]
pub fn changed<T: PartialEq + ?Sized>(a: &T, b: &T) -> bool { a != b && (a == a || b == b) }

/// Identity comparator for shared values: changed if the two handles point at
/// different allocations, whatever their contents.
pub fn identity_changed<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool { !Rc::ptr_eq(a, b) }

/// Construction contract of an [`ExternalSubject`].
///
/// `read` is mandatory, everything else has a default:
///
/// | Option | Default |
/// |--------|---------|
/// | `subscribe` | none, polling only |
/// | `should_update` | [`changed`] (`a != b`) |
/// | `lazy_subscribe` | `false`, the push channel opens at construction |
/// | `synchronizer` | none, bound later by the first binding |
/// | `scheduler` | [`ImmediateScheduler`], used only without a synchronizer |
///
/// ```rust
/// use std::{cell::Cell, rc::Rc};
///
/// use external_subject::prelude::*;
///
/// let source = Rc::new(Cell::new(0));
/// let c_source = source.clone();
/// let subject = SubjectOptions::new(move || c_source.get()).build();
///
/// assert_eq!(subject.get_cached_value(), 0);
/// source.set(1);
/// assert_eq!(subject.get_cached_value(), 0);
/// assert_eq!(subject.get_current_value(), 1);
/// ```
pub struct SubjectOptions<T> {
  pub(crate) read: ReadFn<T>,
  pub(crate) subscribe: Option<SourceSubscribeFn>,
  pub(crate) should_update: ShouldUpdateFn<T>,
  pub(crate) lazy_subscribe: bool,
  pub(crate) synchronizer: Option<Synchronizer>,
  pub(crate) scheduler: Rc<dyn Scheduler>,
}

impl<T: PartialEq + 'static> SubjectOptions<T> {
  pub fn new(read: impl Fn() -> T + 'static) -> Self { Self::with_should_update(read, changed) }
}

impl<T: 'static> SubjectOptions<T> {
  /// Options for a value type without `PartialEq`, or with a comparison other
  /// than equality.
  pub fn with_should_update(
    read: impl Fn() -> T + 'static, should_update: impl Fn(&T, &T) -> bool + 'static,
  ) -> Self {
    Self {
      read: Box::new(read),
      subscribe: None,
      should_update: Box::new(should_update),
      lazy_subscribe: false,
      synchronizer: None,
      scheduler: Rc::new(ImmediateScheduler),
    }
  }

  /// Push channel of the source. The callback receives a [`Notifier`] to
  /// call whenever the source changes, and may return a [`Teardown`] that
  /// closes the channel.
  pub fn subscribe(mut self, subscribe: impl Fn(Notifier) -> Option<Teardown> + 'static) -> Self {
    self.subscribe = Some(Box::new(subscribe));
    self
  }

  pub fn should_update(mut self, should_update: impl Fn(&T, &T) -> bool + 'static) -> Self {
    self.should_update = Box::new(should_update);
    self
  }

  /// Keep the push channel open only while at least one listener is
  /// registered.
  pub fn lazy_subscribe(mut self, lazy: bool) -> Self {
    self.lazy_subscribe = lazy;
    self
  }

  /// Inject the synchronizer up front instead of letting the first binding
  /// bind it.
  pub fn synchronizer(mut self, synchronizer: Synchronizer) -> Self {
    self.synchronizer = Some(synchronizer);
    self
  }

  /// Scheduler that resolves update requests while no synchronizer is bound.
  pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
    self.scheduler = Rc::new(scheduler);
    self
  }
}

impl<T: Clone + 'static> SubjectOptions<T> {
  pub fn build(self) -> ExternalSubject<T> { ExternalSubject::new(self) }
}
