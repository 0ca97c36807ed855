//! Connection pool with scoped leases.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use super::metrics::PoolMetrics;
use crate::config::NetworkConfig;
use crate::error::PoolError;
use crate::transport::{ConnectOptions, Connection, Connector};
use crate::{EndpointSpec, TimeProvider};

/// A connection owned by the pool.
struct PooledConnection {
    id: u64,
    connection: Arc<dyn Connection>,
    /// Outstanding leases on this connection.
    leases: usize,
    /// Last time a lease was granted or returned.
    last_used: Duration,
}

impl PooledConnection {
    fn is_expired(&self, now: Duration, ttl: Duration) -> bool {
        self.leases == 0 && now.saturating_sub(self.last_used) > ttl
    }
}

#[derive(Default)]
struct PoolState {
    buckets: HashMap<EndpointSpec, Vec<PooledConnection>>,
    next_id: u64,
    connections_created: u64,
    connections_evicted: u64,
    leases_granted: u64,
}

struct PoolShared<T: TimeProvider> {
    config: NetworkConfig,
    connector: Arc<dyn Connector>,
    time: T,
    /// Set once by `shutdown`; stored with `Release`, read with `Acquire`.
    stopped: AtomicBool,
    next_io_thread: AtomicUsize,
    state: Mutex<PoolState>,
}

impl<T: TimeProvider> PoolShared<T> {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, endpoint: &EndpointSpec, id: u64) {
        let now = self.time.now();
        let mut state = self.lock();
        let Some(bucket) = state.buckets.get_mut(endpoint) else {
            return; // pool was torn down while leased
        };
        if let Some(pooled) = bucket.iter_mut().find(|c| c.id == id) {
            pooled.leases = pooled.leases.saturating_sub(1);
            pooled.last_used = now;
        }
    }
}

/// Evict broken and expired connections from one bucket.
///
/// Returns the number of evicted connections.
fn evict(bucket: &mut Vec<PooledConnection>, now: Duration, ttl: Duration) -> usize {
    let before = bucket.len();
    bucket.retain(|pooled| {
        let keep = !pooled.connection.is_broken() && !pooled.is_expired(now, ttl);
        if !keep {
            pooled.connection.shutdown();
        }
        keep
    });
    before - bucket.len()
}

/// Per-endpoint pool of reusable connections.
///
/// Cloning yields another handle to the same pool.
pub struct ConnectionPool<T: TimeProvider> {
    shared: Arc<PoolShared<T>>,
}

impl<T: TimeProvider> Clone for ConnectionPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: TimeProvider> ConnectionPool<T> {
    /// Create a pool. The configuration is validated first.
    pub fn new(config: NetworkConfig, connector: Arc<dyn Connector>, time: T) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                config: config.validate(),
                connector,
                time,
                stopped: AtomicBool::new(false),
                next_io_thread: AtomicUsize::new(0),
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// The validated configuration in use.
    pub fn config(&self) -> &NetworkConfig {
        &self.shared.config
    }

    /// Lease a connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// [`PoolError::Unavailable`] once the pool has been shut down and
    /// [`PoolError::EmptyEndpoint`] for the unresolved endpoint.
    pub fn lease(&self, endpoint: &EndpointSpec) -> Result<Lease<T>, PoolError> {
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(PoolError::Unavailable);
        }
        if endpoint.is_empty() {
            return Err(PoolError::EmptyEndpoint);
        }

        let shared = &self.shared;
        let now = shared.time.now();
        let ttl = shared.config.connection_ttl();
        let max_open = shared.config.max_open_connections;

        let mut guard = shared.lock();
        // A concurrent shutdown may have drained the buckets since the check above.
        if shared.stopped.load(Ordering::Acquire) {
            return Err(PoolError::Unavailable);
        }
        let state = &mut *guard;
        let bucket = state.buckets.entry(endpoint.clone()).or_default();

        let evicted = evict(bucket, now, ttl);
        if evicted > 0 {
            tracing::debug!(endpoint = %endpoint, evicted, "evicted pooled connections");
        }
        state.connections_evicted += evicted as u64;

        let idle = bucket
            .iter()
            .enumerate()
            .filter(|(_, c)| c.leases == 0)
            .max_by_key(|(_, c)| c.last_used)
            .map(|(index, _)| index);

        let index = match idle {
            Some(index) => index,
            None if bucket.len() < max_open => {
                let io_thread =
                    shared.next_io_thread.fetch_add(1, Ordering::Relaxed) % shared.config.io_threads;
                let options = ConnectOptions {
                    io_thread,
                    verify_hosts: shared.config.verify_hosts,
                };
                let connection = shared.connector.connect(endpoint, options);
                state.next_id += 1;
                state.connections_created += 1;
                tracing::debug!(
                    endpoint = %endpoint,
                    io_thread,
                    open = bucket.len() + 1,
                    "opened pooled connection"
                );
                bucket.push(PooledConnection {
                    id: state.next_id,
                    connection,
                    leases: 0,
                    last_used: now,
                });
                bucket.len() - 1
            }
            None => {
                // Saturated: share the least-loaded connection.
                bucket
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, c)| c.leases)
                    .map(|(index, _)| index)
                    .ok_or(PoolError::Unavailable)?
            }
        };

        let pooled = &mut bucket[index];
        pooled.leases += 1;
        pooled.last_used = now;
        state.leases_granted += 1;

        Ok(Lease {
            connection: pooled.connection.clone(),
            endpoint: endpoint.clone(),
            id: pooled.id,
            pool: Arc::downgrade(&self.shared),
        })
    }

    /// Evict broken and idle-past-TTL connections across all endpoints.
    ///
    /// Returns the number of connections evicted.
    pub fn prune_idle(&self) -> usize {
        let now = self.shared.time.now();
        let ttl = self.shared.config.connection_ttl();
        let mut state = self.shared.lock();

        let mut evicted = 0;
        for bucket in state.buckets.values_mut() {
            evicted += evict(bucket, now, ttl);
        }
        state.buckets.retain(|_, bucket| !bucket.is_empty());
        state.connections_evicted += evicted as u64;
        evicted
    }

    /// Tear the pool down.
    ///
    /// Every subsequent [`lease`](Self::lease) fails fast with
    /// [`PoolError::Unavailable`]. Connections are shut down; outstanding
    /// leases stay usable until dropped.
    pub fn shutdown(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let buckets = std::mem::take(&mut self.shared.lock().buckets);
        let mut closed = 0usize;
        for pooled in buckets.values().flatten() {
            pooled.connection.shutdown();
            closed += 1;
        }
        tracing::debug!(closed, "connection pool shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Snapshot of pool usage.
    pub fn metrics(&self) -> PoolMetrics {
        let state = self.shared.lock();
        let connections = state.buckets.values().flatten();
        let (open, leased) = connections.fold((0, 0), |(open, leased), c| {
            (open + 1, leased + usize::from(c.leases > 0))
        });
        PoolMetrics {
            open_connections: open,
            leased_connections: leased,
            connections_created: state.connections_created,
            connections_evicted: state.connections_evicted,
            leases_granted: state.leases_granted,
        }
    }
}

/// Scoped lease on a pooled connection.
///
/// The lease is returned to the pool when dropped.
pub struct Lease<T: TimeProvider> {
    connection: Arc<dyn Connection>,
    endpoint: EndpointSpec,
    id: u64,
    pool: Weak<PoolShared<T>>,
}

impl<T: TimeProvider> Lease<T> {
    /// The leased connection.
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// The endpoint the connection points at.
    pub fn endpoint(&self) -> &EndpointSpec {
        &self.endpoint
    }
}

impl<T: TimeProvider> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.release(&self.endpoint, self.id);
        }
    }
}

impl<T: TimeProvider> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("endpoint", &self.endpoint)
            .field("id", &self.id)
            .finish()
    }
}
