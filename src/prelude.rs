//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Observer side
pub use crate::binding::{BindingState, ObserverBinding};
pub use crate::boundary::SuspenseBoundary;
// Errors
pub use crate::error::{ObserveError, ScopeError};
// Requests
pub use crate::request::{Resolution, UpdateRequest};
// Scheduler core types
pub use crate::scheduler::{ImmediateScheduler, ManualScheduler, Scheduler, Task};
// Scopes
pub use crate::scope::{ObservationScope, ScopeGuard};
// Subject
pub use crate::subject::{
  changed, identity_changed, ExternalSubject, ListenerSubscription, Notifier, SubjectOptions,
};
// Subscription
pub use crate::subscription::{Subscription, SubscriptionGuard, Teardown};
// Synchronizer
pub use crate::synchronizer::Synchronizer;
