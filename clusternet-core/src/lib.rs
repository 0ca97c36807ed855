//! # clusternet-core
//!
//! Core abstractions for the clusternet request-dispatch layer.
//!
//! This crate provides the runtime seams that the dispatch layer is written
//! against, plus the vocabulary types shared by every component:
//!
//! - **Provider traits**: Abstractions for time, timers and task spawning
//! - **Core types**: [`DestinationId`], [`EndpointSpec`], [`RestVerb`], [`Headers`]
//!
//! ## Provider Traits
//!
//! The provider traits let the dispatch layer run unchanged on a real Tokio
//! runtime or on Tokio's paused test clock:
//!
//! - [`TimeProvider`]: Sleep, timeout, and time operations
//! - [`TimerService`]: One-shot wakeups at an absolute time, cancellable
//! - [`TaskProvider`]: Spawning of named background tasks
//! - [`Providers`]: Bundle of the above behind a single type parameter

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod providers;
mod task;
mod time;
mod timer;
mod types;

// Provider trait exports
pub use providers::{Providers, TokioProviders};
pub use task::{TaskProvider, TokioTaskProvider};
pub use time::{TimeError, TimeProvider, TokioTimeProvider};
pub use timer::{TimerCallback, TimerHandle, TimerService, TimerTrigger};

// Core type exports
pub use types::{DestinationId, EndpointSpec, Headers, RestVerb};
