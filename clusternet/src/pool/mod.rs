//! Per-endpoint connection pooling.
//!
//! The pool hands out scoped [`Lease`]s on connections, grouped by resolved
//! endpoint. It is the one piece of shared mutable state in the dispatch
//! layer and is safe to lease from and release into from any thread.
//!
//! # Lease selection
//!
//! ```text
//! lease(endpoint)
//!   ├─ pool stopped?                 → PoolError::Unavailable
//!   ├─ evict broken + idle-past-TTL connections of this endpoint
//!   ├─ idle connection available?    → reuse the most recently used one
//!   ├─ below max_open_connections?   → open a new connection
//!   └─ otherwise                     → share the least-loaded connection
//! ```
//!
//! Leasing never blocks waiting for a connection: transports multiplex
//! requests, so a saturated endpoint shares its connections instead.

/// Pool and lease implementation
pub mod core;

/// Pool metrics snapshot
pub mod metrics;

pub use self::core::{ConnectionPool, Lease};
pub use metrics::PoolMetrics;
