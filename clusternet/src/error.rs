//! Error types for the clusternet layer.
//!
//! Request outcomes are never reported through these types: dispatch always
//! completes its [`ResponseFuture`](crate::ResponseFuture) with a
//! [`Response`](crate::Response). These errors cover setup and the
//! collaborator seams (resolution, pool leasing).

use crate::DestinationId;

/// Errors raised while resolving a destination to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No entry is known for the destination.
    #[error("unknown destination: {destination}")]
    UnknownDestination {
        /// The destination that could not be found.
        destination: DestinationId,
    },

    /// The destination is known but has no usable endpoint.
    #[error("destination unreachable: {destination}")]
    Unreachable {
        /// The destination whose endpoint is empty.
        destination: DestinationId,
    },
}

/// Errors raised by the connection pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// The pool has been torn down (or never set up).
    #[error("connection pool unavailable")]
    Unavailable,

    /// The empty endpoint cannot be leased.
    #[error("cannot lease a connection for an empty endpoint")]
    EmptyEndpoint,
}

/// Crate-level error type for setting up the network feature.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// A required collaborator was not supplied to the builder.
    #[error("missing component: {component}")]
    MissingComponent {
        /// Name of the missing component.
        component: &'static str,
    },

    /// Connection pool error.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}
