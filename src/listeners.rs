use std::rc::Rc;

use smallvec::SmallVec;

/// A registered change callback.
pub type Listener = Rc<dyn Fn()>;

/// Listener container with ID-based tracking.
///
/// Each listener gets a unique ID on `add`, which its subscription handle
/// later uses to remove exactly that entry. Insertion order is kept, so a
/// notification wave reaches listeners in registration order.
///
/// # Design
///
/// - **SmallVec Optimization**: most subjects have one or two observers, kept
///   inline without a heap allocation.
/// - **Snapshot Broadcast**: [`Listeners::snapshot`] clones the `Rc` handles
///   so the owner can release its borrow before running any callback.
///   Listeners are free to subscribe, unsubscribe or re-check the subject from
///   inside a notification.
pub struct Listeners {
  next_id: usize,
  items: SmallVec<[(usize, Listener); 2]>,
}

impl Default for Listeners {
  fn default() -> Self { Self { next_id: 0, items: SmallVec::new() } }
}

impl Listeners {
  /// Add a listener and return its unique ID.
  #[inline]
  pub fn add(&mut self, listener: Listener) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.items.push((id, listener));
    id
  }

  /// Remove a listener by ID.
  pub fn remove(&mut self, id: usize) -> Option<Listener> {
    self
      .items
      .iter()
      .position(|(i, _)| *i == id)
      .map(|pos| self.items.remove(pos).1)
  }

  /// Check if an ID exists in the container.
  #[inline]
  pub fn contains(&self, id: usize) -> bool { self.items.iter().any(|(i, _)| *i == id) }

  #[inline]
  pub fn len(&self) -> usize { self.items.len() }

  #[inline]
  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  #[inline]
  pub fn clear(&mut self) { self.items.clear(); }

  /// Listeners in registration order, detached from the container.
  ///
  /// A listener removed while the returned wave is running may still be
  /// invoked for that wave, but never for a later one.
  pub fn snapshot(&self) -> SmallVec<[Listener; 2]> {
    self
      .items
      .iter()
      .map(|(_, l)| l.clone())
      .collect()
  }
}

#[cfg(test)]
mod test {
  use std::cell::RefCell;

  use super::*;

  fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> Listener {
    let log = log.clone();
    Rc::new(move || log.borrow_mut().push(tag))
  }

  #[external_subject_macro::test]
  fn snapshot_keeps_registration_order() {
    let log = Rc::new(RefCell::new(vec![]));
    let mut listeners = Listeners::default();
    listeners.add(recorder(&log, "a"));
    let b = listeners.add(recorder(&log, "b"));
    listeners.add(recorder(&log, "c"));
    assert!(listeners.remove(b).is_some());
    assert!(!listeners.contains(b));
    listeners.add(recorder(&log, "d"));

    for l in listeners.snapshot() {
      l();
    }
    assert_eq!(*log.borrow(), vec!["a", "c", "d"]);
  }

  #[external_subject_macro::test]
  fn ids_are_never_reused() {
    let mut listeners = Listeners::default();
    let a = listeners.add(Rc::new(|| {}));
    listeners.remove(a);
    let b = listeners.add(Rc::new(|| {}));
    assert_ne!(a, b);
    assert!(listeners.remove(a).is_none());
    assert_eq!(listeners.len(), 1);
    listeners.clear();
    assert!(listeners.is_empty());
  }
}
