//! Network configuration.
//!
//! [`NetworkConfig`] carries the tunables the connection pool needs.
//! [`NetworkOptions`] exposes them on a command line; both paths end in
//! [`NetworkConfig::validate`], which clamps values into their sane ranges.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound for `max_open_connections`.
pub const MIN_OPEN_CONNECTIONS: usize = 8;

/// Lower bound for `connection_ttl_millis`.
pub const MIN_CONNECTION_TTL_MILLIS: u64 = 10_000;

/// Upper bound for `io_threads`.
pub const MAX_IO_THREADS: usize = 8;

/// Configuration for the connection pool and transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of network IO threads connections are spread over.
    pub io_threads: usize,

    /// Maximum open connections per endpoint.
    pub max_open_connections: usize,

    /// Idle time after which a pooled connection is evicted.
    pub connection_ttl_millis: u64,

    /// Verify peer hosts when using TLS.
    pub verify_hosts: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            io_threads: 1,
            max_open_connections: 128,
            connection_ttl_millis: 5 * 60 * 1000,
            verify_hosts: false,
        }
    }
}

impl NetworkConfig {
    /// Clamp every tunable into its accepted range.
    ///
    /// - `io_threads` into `[1, MAX_IO_THREADS]`
    /// - `max_open_connections` to at least [`MIN_OPEN_CONNECTIONS`]
    /// - `connection_ttl_millis` to at least [`MIN_CONNECTION_TTL_MILLIS`]
    pub fn validate(mut self) -> Self {
        self.io_threads = self.io_threads.clamp(1, MAX_IO_THREADS);
        self.max_open_connections = self.max_open_connections.max(MIN_OPEN_CONNECTIONS);
        self.connection_ttl_millis = self.connection_ttl_millis.max(MIN_CONNECTION_TTL_MILLIS);
        self
    }

    /// Connection idle TTL as a duration.
    pub fn connection_ttl(&self) -> Duration {
        Duration::from_millis(self.connection_ttl_millis)
    }

    /// Set the IO thread count.
    pub fn with_io_threads(mut self, io_threads: usize) -> Self {
        self.io_threads = io_threads;
        self
    }

    /// Set the per-endpoint connection cap.
    pub fn with_max_open_connections(mut self, max_open_connections: usize) -> Self {
        self.max_open_connections = max_open_connections;
        self
    }

    /// Set the idle connection TTL.
    pub fn with_connection_ttl(mut self, ttl: Duration) -> Self {
        self.connection_ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable TLS host verification.
    pub fn with_verify_hosts(mut self, verify_hosts: bool) -> Self {
        self.verify_hosts = verify_hosts;
        self
    }
}

/// Command-line options for the network layer.
///
/// Flatten into an application's parser:
///
/// ```rust,ignore
/// #[derive(clap::Parser)]
/// struct Args {
///     #[command(flatten)]
///     network: NetworkOptions,
/// }
/// ```
#[derive(clap::Args, Clone, Debug)]
#[command(next_help_heading = "Networking")]
pub struct NetworkOptions {
    /// Number of network IO threads
    #[arg(long = "network.io-threads", default_value_t = 1)]
    pub io_threads: usize,

    /// Max open network connections per endpoint
    #[arg(long = "network.max-open-connections", default_value_t = 128)]
    pub max_open_connections: usize,

    /// Default time-to-live of idle connections, in milliseconds
    #[arg(long = "network.connection-ttl", default_value_t = 300_000)]
    pub connection_ttl_millis: u64,

    /// Verify hosts when using TLS
    #[arg(long = "network.verify-hosts")]
    pub verify_hosts: bool,
}

impl NetworkOptions {
    /// Build a validated configuration from the parsed options.
    pub fn into_config(self) -> NetworkConfig {
        NetworkConfig {
            io_threads: self.io_threads,
            max_open_connections: self.max_open_connections,
            connection_ttl_millis: self.connection_ttl_millis,
            verify_hosts: self.verify_hosts,
        }
        .validate()
    }
}
