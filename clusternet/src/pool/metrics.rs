//! Metrics snapshot for the connection pool.

/// Point-in-time view of pool usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Connections currently held by the pool.
    pub open_connections: usize,

    /// Connections with at least one outstanding lease.
    pub leased_connections: usize,

    /// Connections opened over the pool's lifetime.
    pub connections_created: u64,

    /// Connections dropped for being broken or idle past the TTL.
    pub connections_evicted: u64,

    /// Leases handed out over the pool's lifetime.
    pub leases_granted: u64,
}

impl PoolMetrics {
    /// Connections currently sitting idle.
    pub fn idle_connections(&self) -> usize {
        self.open_connections - self.leased_connections
    }
}
