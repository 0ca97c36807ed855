//! # clusternet
//!
//! Retrying request dispatch between cluster members.
//!
//! This crate provides:
//! - **Resolver**: Logical destination to network endpoint lookup
//! - **Connection pool**: Per-endpoint pooled connections with scoped leases
//! - **Request builder**: Database path handling, causal timestamp and origin headers
//! - **Dispatch**: Single-shot and retrying sends against a fixed deadline
//! - **Network feature**: Process-wide lifecycle of the pool and shutdown signal
//!
//! The wire protocol itself is out of scope: it is plugged in through the
//! [`Connector`] / [`Connection`] traits.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// Re-export core types for convenience
pub use clusternet_core::{
    DestinationId, EndpointSpec, Headers, Providers, RestVerb, TaskProvider, TimeError,
    TimeProvider, TimerCallback, TimerHandle, TimerService, TimerTrigger, TokioProviders,
    TokioTaskProvider, TokioTimeProvider,
};

// =============================================================================
// Modules
// =============================================================================

/// Hybrid logical clock helpers.
pub mod clock;

/// Network tunables and their command-line options.
pub mod config;

/// Single-shot and retrying dispatch.
pub mod dispatch;

/// Error types for setup and collaborator seams.
pub mod error;

/// Process-wide network feature.
pub mod feature;

/// Per-endpoint connection pooling.
pub mod pool;

/// Single-assignment response delivery.
pub mod promise;

/// Wire request assembly and server identity.
pub mod request;

/// Destination resolution.
pub mod resolver;

/// Consumed wire-transport interface.
pub mod transport;

// =============================================================================
// Public API Re-exports
// =============================================================================

// Configuration exports
pub use config::{NetworkConfig, NetworkOptions};

// Error exports
pub use error::{NetworkError, PoolError, ResolveError};

// Dispatch exports
pub use dispatch::{RetryRequest, dispatch_retry, send_request, send_request_retry};
pub use feature::{NetworkFeature, NetworkFeatureBuilder};
pub use promise::{Response, ResponseFuture, ResponsePromise, response_channel};

// Pool exports
pub use pool::{ConnectionPool, Lease, PoolMetrics};

// Request exports
pub use clock::{create_hlc, decode_timestamp_header};
pub use request::{RequestBuilder, ServerIdentity, ServerRole};

// Resolver exports
pub use resolver::{DestinationResolver, TopologyResolver};

// Transport exports
pub use transport::{
    ConnectOptions, Connection, Connector, ErrorCondition, RequestCallback, WireRequest,
    WireResponse,
};
