//! The external subject.
//!
//! [`ExternalSubject`] wraps a value living outside the observers' own state
//! (a global counter, a socket-fed value, a browser API) behind a validated
//! cache. Observers read the cache; tear detection compares it with the live
//! value and, on mismatch, opens a single-flight [`UpdateRequest`] whose
//! resolution refreshes the cache and notifies every listener in one wave.
//!
//! # Compare now, commit later
//!
//! `request_update` only compares. The cache is refreshed later, when the
//! request's resolution runs on the bound [`Synchronizer`] (or on the
//! fallback scheduler). Every observer that checks the subject during the
//! same pass folds into the one request in flight, so a burst of mutations
//! costs one cache refresh and one notification wave.
//!
//! # Re-Entrancy
//!
//! No internal borrow is held while `read`, `should_update`, the source
//! `subscribe` callback or a listener runs. Those callbacks may call back into
//! the subject freely.
//!
//! # Destroy
//!
//! After [`ExternalSubject::destroy`], `request_update` and `subscribe` are
//! precondition violations and panic. Reads keep working.

use std::{
  cell::RefCell,
  fmt::{Debug, Formatter},
  rc::{Rc, Weak},
};

use once_cell::unsync::OnceCell;

use crate::{
  listeners::Listeners,
  request::UpdateRequest,
  scheduler::Scheduler,
  subscription::{Subscription, Teardown},
  synchronizer::Synchronizer,
};

mod options;
pub use options::{changed, identity_changed, SubjectOptions};
use options::{ReadFn, ShouldUpdateFn, SourceSubscribeFn};

// ============================================================================
// Notifier
// ============================================================================

/// Handed to the source's push channel; call [`Notifier::notify`] whenever
/// the source changed.
///
/// Notifying runs a tear check on the subject. It is a no-op once the subject
/// is dropped or destroyed.
#[derive(Clone)]
pub struct Notifier(Rc<dyn Fn()>);

impl Notifier {
  pub fn notify(&self) { (self.0)() }
}

impl Debug for Notifier {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("Notifier") }
}

// ============================================================================
// ExternalSubject
// ============================================================================

struct SubjectState<T> {
  cache: Option<T>,
  listeners: Listeners,
  request: Option<UpdateRequest>,
  channel: Option<Teardown>,
  next_request_id: u64,
  destroyed: bool,
}

struct SubjectCore<T> {
  read: ReadFn<T>,
  source_subscribe: Option<SourceSubscribeFn>,
  should_update: ShouldUpdateFn<T>,
  lazy_subscribe: bool,
  fallback: Rc<dyn Scheduler>,
  synchronizer: OnceCell<Synchronizer>,
  state: RefCell<SubjectState<T>>,
}

/// A cached, comparison-aware, singly-flighted view of an external value.
///
/// Clones are handles to the same subject.
///
/// # Invariants
///
/// 1. At most one live [`UpdateRequest`] exists at a time.
/// 2. `get_request()` is `Some` iff a mismatch was detected and not yet
///    resolved; meanwhile `get_cached_value()` keeps returning the stale
///    snapshot.
/// 3. The cache changes only in the resolution step (its first lazy
///    initialisation excepted).
/// 4. Listeners are notified in registration order, once per resolved request;
///    a superseded request never refreshes the cache or notifies.
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
/// let commit = ManualScheduler::new();
/// let subject = SubjectOptions::new(move || c_source.get())
///   .scheduler(commit.clone())
///   .build();
///
/// assert_eq!(subject.get_cached_value(), 0);
/// source.set(1337);
///
/// subject.request_update();
/// let request = subject.get_request().unwrap();
/// assert_eq!(subject.get_cached_value(), 0);
///
/// commit.run_until_idle();
/// assert!(request.resolution().is_settled());
/// assert_eq!(subject.get_cached_value(), 1337);
/// ```
pub struct ExternalSubject<T> {
  core: Rc<SubjectCore<T>>,
}

impl<T> Clone for ExternalSubject<T> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T: Clone + 'static> ExternalSubject<T> {
  pub fn new(options: SubjectOptions<T>) -> Self {
    let SubjectOptions { read, subscribe, should_update, lazy_subscribe, synchronizer, scheduler } =
      options;
    let core = Rc::new(SubjectCore {
      read,
      source_subscribe: subscribe,
      should_update,
      lazy_subscribe,
      fallback: scheduler,
      synchronizer: synchronizer.map(OnceCell::with_value).unwrap_or_default(),
      state: RefCell::new(SubjectState {
        cache: None,
        listeners: Listeners::default(),
        request: None,
        channel: None,
        next_request_id: 0,
        destroyed: false,
      }),
    });
    let subject = Self { core };
    if !subject.core.lazy_subscribe {
      subject.open_channel();
    }
    subject
  }

  fn from_weak(weak: &Weak<SubjectCore<T>>) -> Option<Self> {
    weak.upgrade().map(|core| Self { core })
  }

  /// The live value, read straight from the source.
  pub fn get_current_value(&self) -> T { (self.core.read)() }

  /// The last validated snapshot, initialised from the source on first access.
  pub fn get_cached_value(&self) -> T {
    let cached = self.core.state.borrow().cache.clone();
    match cached {
      Some(value) => value,
      None => {
        let value = (self.core.read)();
        self
          .core
          .state
          .borrow_mut()
          .cache
          .get_or_insert(value)
          .clone()
      }
    }
  }

  /// The update request in flight, if a tear is waiting to be resolved.
  pub fn get_request(&self) -> Option<UpdateRequest> { self.core.state.borrow().request.clone() }

  /// Compare two values with this subject's comparator.
  pub fn should_update(&self, a: &T, b: &T) -> bool { (self.core.should_update)(a, b) }

  /// Tear check: compare the cached snapshot with the live value.
  ///
  /// If they agree nothing happens. Otherwise any request in flight is
  /// superseded and a new one is opened; its resolution is scheduled on the
  /// bound synchronizer, or on the fallback scheduler when none is bound.
  ///
  /// # Panics
  ///
  /// Panics if the subject was destroyed.
  pub fn request_update(&self) {
    self.assert_alive("request_update");
    let cached = self.get_cached_value();
    let live = (self.core.read)();
    if !(self.core.should_update)(&cached, &live) {
      return;
    }

    let (request, previous) = {
      let mut state = self.core.state.borrow_mut();
      let request = UpdateRequest::new(state.next_request_id);
      state.next_request_id += 1;
      let previous = state.request.replace(request.clone());
      (request, previous)
    };
    if let Some(previous) = previous {
      tracing::trace!(superseded = previous.id(), by = request.id(), "update request superseded");
      previous.supersede(&request);
    }
    tracing::debug!(request = request.id(), "tear detected, update requested");

    let weak = Rc::downgrade(&self.core);
    self.defer(move || match Self::from_weak(&weak) {
      Some(subject) => subject.resolve(&request),
      None => {
        request.kill();
        request.resolution().settle();
      }
    });
  }

  /// Schedule a tear check for after the current pass, through the same path
  /// resolutions take. Skipped if a request is already in flight by then.
  pub fn request_update_deferred(&self) {
    let weak = Rc::downgrade(&self.core);
    self.defer(move || {
      if let Some(subject) = Self::from_weak(&weak) {
        if !subject.is_destroyed() && subject.get_request().is_none() {
          subject.request_update();
        }
      }
    });
  }

  /// Register a change listener.
  ///
  /// Under `lazy_subscribe` the first listener opens the source's push
  /// channel, and unsubscribing the last one closes it.
  ///
  /// # Panics
  ///
  /// Panics if the subject was destroyed.
  pub fn subscribe(&self, listener: impl Fn() + 'static) -> ListenerSubscription {
    self.assert_alive("subscribe");
    let (id, first) = {
      let mut state = self.core.state.borrow_mut();
      let id = state.listeners.add(Rc::new(listener));
      (id, state.listeners.len() == 1)
    };
    if first && self.core.lazy_subscribe {
      self.open_channel();
    }
    let core: Rc<dyn ListenerHost> = self.core.clone();
    ListenerSubscription { host: Rc::downgrade(&core), id }
  }

  /// Bind the synchronizer resolutions go through. The first call wins; later
  /// calls are no-ops, so every binding sharing this subject can call it.
  pub fn set_synchronizer(&self, synchronizer: &Synchronizer) {
    if self.core.synchronizer.set(synchronizer.clone()).is_ok() {
      tracing::trace!("synchronizer bound");
    }
  }

  pub fn synchronizer(&self) -> Option<Synchronizer> { self.core.synchronizer.get().cloned() }

  /// Kill the request in flight, drop all listeners and close the push
  /// channel. Anything suspended on the killed request is released.
  /// Idempotent.
  pub fn destroy(&self) {
    let (request, channel) = {
      let mut state = self.core.state.borrow_mut();
      if state.destroyed {
        return;
      }
      state.destroyed = true;
      state.listeners.clear();
      (state.request.take(), state.channel.take())
    };
    if let Some(request) = request {
      request.kill();
      request.resolution().settle();
    }
    if let Some(channel) = channel {
      channel.unsubscribe();
    }
    tracing::debug!("subject destroyed");
  }

  pub fn is_destroyed(&self) -> bool { self.core.state.borrow().destroyed }

  pub fn listener_count(&self) -> usize { self.core.state.borrow().listeners.len() }

  /// Whether the source's push channel is currently open.
  pub fn is_channel_open(&self) -> bool { self.core.state.borrow().channel.is_some() }

  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.core, &other.core) }

  fn assert_alive(&self, op: &str) {
    assert!(!self.is_destroyed(), "ExternalSubject::{op} called after destroy");
  }

  fn defer(&self, task: impl FnOnce() + 'static) {
    match self.core.synchronizer.get() {
      Some(synchronizer) => synchronizer.synchronize(task),
      None => self.core.fallback.schedule(Box::new(task)),
    }
  }

  fn resolve(&self, request: &UpdateRequest) {
    if !request.kill() {
      tracing::trace!(request = request.id(), "dead update request fired, ignored");
      return;
    }
    let value = (self.core.read)();
    let listeners = {
      let mut state = self.core.state.borrow_mut();
      if state
        .request
        .as_ref()
        .is_some_and(|r| r.ptr_eq(request))
      {
        state.request = None;
      }
      state.cache = Some(value);
      state.listeners.snapshot()
    };
    tracing::debug!(request = request.id(), listeners = listeners.len(), "update resolved");
    listeners.iter().for_each(|listener| listener());
    request.resolution().settle();
  }

  fn open_channel(&self) {
    let Some(source_subscribe) = self.core.source_subscribe.as_ref() else {
      return;
    };
    let weak = Rc::downgrade(&self.core);
    let notifier = Notifier(Rc::new(move || {
      if let Some(subject) = Self::from_weak(&weak) {
        if !subject.is_destroyed() {
          subject.request_update();
        }
      }
    }));
    let teardown = source_subscribe(notifier).unwrap_or_else(Teardown::noop);
    let stale = self.core.state.borrow_mut().channel.replace(teardown);
    if let Some(stale) = stale {
      stale.unsubscribe();
    }
    tracing::trace!(lazy = self.core.lazy_subscribe, "push channel opened");
  }
}

// ============================================================================
// Listener subscriptions
// ============================================================================

/// Object-safe view of a subject used by [`ListenerSubscription`].
trait ListenerHost {
  fn remove_listener(&self, id: usize);
  fn has_listener(&self, id: usize) -> bool;
}

impl<T> ListenerHost for SubjectCore<T> {
  fn remove_listener(&self, id: usize) {
    let channel = {
      let mut state = self.state.borrow_mut();
      let removed = state.listeners.remove(id).is_some();
      if removed && self.lazy_subscribe && state.listeners.is_empty() {
        state.channel.take()
      } else {
        None
      }
    };
    if let Some(channel) = channel {
      channel.unsubscribe();
      tracing::trace!("push channel closed");
    }
  }

  fn has_listener(&self, id: usize) -> bool { self.state.borrow().listeners.contains(id) }
}

/// Handle of one listener registered with [`ExternalSubject::subscribe`].
///
/// Does not keep the subject alive.
pub struct ListenerSubscription {
  host: Weak<dyn ListenerHost>,
  id: usize,
}

impl Subscription for ListenerSubscription {
  fn unsubscribe(self) {
    if let Some(host) = self.host.upgrade() {
      host.remove_listener(self.id);
    }
  }

  fn is_closed(&self) -> bool {
    self
      .host
      .upgrade()
      .is_none_or(|host| !host.has_listener(self.id))
  }
}

impl Debug for ListenerSubscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ListenerSubscription")
      .field("id", &self.id)
      .field("is_closed", &self.is_closed())
      .finish()
  }
}

impl<T> Debug for ExternalSubject<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = self.core.state.borrow();
    f.debug_struct("ExternalSubject")
      .field("cached", &state.cache.is_some())
      .field("listeners", &state.listeners.len())
      .field("request", &state.request)
      .field("channel_open", &state.channel.is_some())
      .field("destroyed", &state.destroyed)
      .finish()
  }
}
