//! Error types.

use thiserror::Error;

use crate::request::Resolution;

/// Why an observer binding could not produce a value.
#[derive(Debug, Error)]
pub enum ObserveError {
  /// A tear was detected and the binding runs in suspense mode. The host
  /// should park the observer and activate it again once the resolution
  /// settles.
  #[error("observer suspended until the pending update settles")]
  Suspended(Resolution),

  /// The subject was destroyed; there is nothing left to observe.
  #[error("the observed subject has been destroyed")]
  Destroyed,
}

impl ObserveError {
  /// The token to wait on, if this is a suspension.
  pub fn resolution(&self) -> Option<&Resolution> {
    match self {
      ObserveError::Suspended(resolution) => Some(resolution),
      ObserveError::Destroyed => None,
    }
  }

  pub fn is_suspended(&self) -> bool { matches!(self, ObserveError::Suspended(_)) }
}

/// Errors looking up the ambient observation scope.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScopeError {
  #[error("found no synchronizer: no observation scope is active on this thread")]
  NoSynchronizer,
}

#[cfg(test)]
mod test {
  use super::*;

  #[external_subject_macro::test]
  fn messages() {
    assert_eq!(
      ScopeError::NoSynchronizer.to_string(),
      "found no synchronizer: no observation scope is active on this thread"
    );
    assert_eq!(ObserveError::Destroyed.to_string(), "the observed subject has been destroyed");
    assert!(ObserveError::Destroyed.resolution().is_none());
  }

  #[external_subject_macro::test]
  fn suspension_exposes_its_token() {
    let resolution = Resolution::new();
    let err = ObserveError::Suspended(resolution.clone());
    assert!(err.is_suspended());
    assert!(err.resolution().is_some_and(|r| r.ptr_eq(&resolution)));
  }
}
