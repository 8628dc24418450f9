//! # external-subject: tear-free observation of external values
//!
//! Observers that read a mutable value living outside their own state (a
//! global, a socket-fed counter, a browser API) may see different snapshots
//! within one render pass if the value changes half way through. That is
//! *tearing*. This crate puts such a value behind an [`ExternalSubject`]: a
//! validated cache plus a single-flight update request, resolved in batches by
//! a [`Synchronizer`] so every observer switches to the new snapshot together.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::{cell::Cell, rc::Rc};
//!
//! use external_subject::{prelude::*, scheduler::ManualScheduler};
//!
//! let counter = Rc::new(Cell::new(0));
//! let c_counter = counter.clone();
//! let subject = SubjectOptions::new(move || c_counter.get()).build();
//!
//! // One scope per observation tree; the manual scheduler is its commit hook.
//! let commit = ManualScheduler::new();
//! let scope = ObservationScope::new(commit.clone());
//! let mut a = ObserverBinding::new(subject.clone(), true, || {});
//! let mut b = ObserverBinding::new(subject, true, || {});
//!
//! scope.run(|| {
//!   assert_eq!(a.activate().unwrap(), 0);
//!   counter.set(1337);
//!   // `b` sees the tear and waits instead of showing 1337 next to `a`'s 0.
//!   assert!(b.activate().unwrap_err().is_suspended());
//! });
//!
//! commit.run_until_idle();
//! scope.run(|| {
//!   assert_eq!(a.activate().unwrap(), 1337);
//!   assert_eq!(b.activate().unwrap(), 1337);
//! });
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ExternalSubject`] | Cache, tear detection and listeners for one external value |
//! | [`UpdateRequest`] / [`Resolution`] | The single request in flight and the token observers wait on |
//! | [`Synchronizer`] | Batches resolutions so they commit together |
//! | [`ObservationScope`] | Makes a synchronizer current for one observation tree |
//! | [`ObserverBinding`] | Per-observer activation and tear check |
//! | [`SuspenseBoundary`] | Observers that suspend and resume as one group |
//! | [`Scheduler`] | Host hook deciding when deferred work runs |
//!
//! Everything is single-threaded (`Rc`/`RefCell`); user callbacks always run
//! with no internal borrow held, so they may re-enter the crate.
//!
//! ## Feature Flags
//!
//! - **`futures-scheduler`** (default): [`LocalPoolScheduler`] on a `futures`
//!   local executor
//! - **`tokio-scheduler`**: [`TokioLocalScheduler`] on a tokio `LocalSet`
//!
//! [`ExternalSubject`]: subject::ExternalSubject
//! [`UpdateRequest`]: request::UpdateRequest
//! [`Resolution`]: request::Resolution
//! [`Synchronizer`]: synchronizer::Synchronizer
//! [`ObservationScope`]: scope::ObservationScope
//! [`ObserverBinding`]: binding::ObserverBinding
//! [`Scheduler`]: scheduler::Scheduler
//! [`LocalPoolScheduler`]: scheduler::LocalPoolScheduler
//! [`TokioLocalScheduler`]: scheduler::TokioLocalScheduler

pub mod binding;
pub mod boundary;
pub mod error;
mod listeners;
pub mod prelude;
pub mod rc;
pub mod request;
pub mod scheduler;
pub mod scope;
pub mod subject;
pub mod subscription;
pub mod synchronizer;

pub use prelude::*;

#[cfg(all(doctest, not(target_arch = "wasm32")))]
mod __markdown_doctests {
  mod readme {
    #![doc = include_str!("../README.md")]
  }
}
