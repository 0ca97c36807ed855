//! Process-wide network feature.
//!
//! [`NetworkFeature`] bundles everything a dispatch needs: providers, the
//! destination resolver, the connector, the request builder and the
//! connection pool. It also owns the process shutdown signal.
//!
//! # Lifecycle
//!
//! ```text
//! NetworkFeature::builder()...build()   no pool yet; dispatch → Canceled
//!         │
//!    prepare()                          pool created and published,
//!         │                             idle pruner spawned
//!         │
//!   begin_shutdown()                    stopping flagged, pruner aborted,
//!                                       pool unpublished and torn down,
//!                                       parked retries woken
//! ```
//!
//! # Memory ordering
//!
//! The pool slot is an [`ArcSwapOption`]: publishing and unpublishing are
//! release stores, [`NetworkFeature::pool`] is an acquire load. The
//! stopping flag is stored with `Release` before the pool is unpublished
//! and read with `Acquire`, so a dispatch on any thread that observes an
//! unpublished pool also observes the stopping flag.
//!
//! Publication is a compare-and-swap against an empty slot, so concurrent
//! `prepare` calls publish exactly one pool. A `prepare` racing with
//! `begin_shutdown` re-checks the flag after publishing and takes its pool
//! back down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::NetworkConfig;
use crate::error::NetworkError;
use crate::pool::ConnectionPool;
use crate::request::{RequestBuilder, ServerIdentity};
use crate::resolver::DestinationResolver;
use crate::transport::Connector;
use crate::{Providers, TaskProvider, TimeProvider, TokioProviders};

/// Floor for the interval between idle-connection sweeps.
const MIN_PRUNE_INTERVAL: Duration = Duration::from_secs(1);

struct FeatureInner<P: Providers> {
    config: NetworkConfig,
    providers: P,
    resolver: Arc<dyn DestinationResolver>,
    connector: Arc<dyn Connector>,
    requests: RequestBuilder,
    pool: ArcSwapOption<ConnectionPool<P::Time>>,
    stopping: AtomicBool,
    shutdown: Notify,
    pruner: Mutex<Option<JoinHandle<()>>>,
}

/// Shared handle to the network feature.
///
/// Cloning yields another handle to the same feature.
pub struct NetworkFeature<P: Providers = TokioProviders> {
    inner: Arc<FeatureInner<P>>,
}

impl<P: Providers> Clone for NetworkFeature<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl NetworkFeature<TokioProviders> {
    /// Start building a feature running on Tokio.
    pub fn builder() -> NetworkFeatureBuilder<TokioProviders> {
        NetworkFeatureBuilder::new(TokioProviders::new())
    }
}

impl<P: Providers> NetworkFeature<P> {
    /// Start building a feature with custom providers.
    pub fn builder_with_providers(providers: P) -> NetworkFeatureBuilder<P> {
        NetworkFeatureBuilder::new(providers)
    }

    /// Create and publish the connection pool, and start sweeping it for
    /// idle connections.
    ///
    /// Calling this again while a pool is published is a no-op.
    ///
    /// # Errors
    ///
    /// Fails with [`PoolError::Unavailable`](crate::PoolError::Unavailable)
    /// once shutdown has begun.
    pub fn prepare(&self) -> Result<(), NetworkError> {
        if self.is_stopping() {
            return Err(crate::PoolError::Unavailable.into());
        }
        if self.inner.pool.load().is_some() {
            return Ok(());
        }
        let pool = Arc::new(ConnectionPool::new(
            self.inner.config.clone(),
            self.inner.connector.clone(),
            self.inner.providers.time().clone(),
        ));

        let previous = self
            .inner
            .pool
            .compare_and_swap(&None::<Arc<ConnectionPool<P::Time>>>, Some(pool.clone()));
        if previous.is_some() {
            // Another caller won; ours was never leased from.
            return Ok(());
        }
        if self.is_stopping() {
            // Shutdown may have swapped the slot before we filled it.
            if let Some(published) = self.inner.pool.swap(None) {
                published.shutdown();
            }
            pool.shutdown();
            return Err(crate::PoolError::Unavailable.into());
        }

        self.spawn_pruner(&pool);
        tracing::debug!(
            io_threads = self.inner.config.io_threads,
            max_open_connections = self.inner.config.max_open_connections,
            connection_ttl_ms = self.inner.config.connection_ttl_millis,
            "connection pool published"
        );
        Ok(())
    }

    /// Sweep `pool` every half TTL until it is torn down or dropped.
    fn spawn_pruner(&self, pool: &Arc<ConnectionPool<P::Time>>) {
        let interval = (self.inner.config.connection_ttl() / 2).max(MIN_PRUNE_INTERVAL);
        let time = self.inner.providers.time().clone();
        let pool: Weak<ConnectionPool<P::Time>> = Arc::downgrade(pool);

        let handle = self.inner.providers.task().spawn_task(
            "clusternet-pool-pruner",
            async move {
                loop {
                    time.sleep(interval).await;
                    let Some(pool) = pool.upgrade() else { break };
                    if pool.is_shut_down() {
                        break;
                    }
                    let evicted = pool.prune_idle();
                    if evicted > 0 {
                        tracing::debug!(evicted, "idle connections pruned");
                    }
                }
            },
        );

        let mut pruner = self.inner.pruner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stale) = pruner.replace(handle) {
            stale.abort();
        }
    }

    /// Begin process shutdown.
    ///
    /// New dispatches terminate with `Canceled`; requests parked in backoff
    /// wake up and terminate the same way. Attempts already handed to the
    /// transport still complete. Idempotent.
    pub fn begin_shutdown(&self) {
        if self.inner.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        let pruner = self
            .inner
            .pruner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pruner) = pruner {
            pruner.abort();
        }
        if let Some(pool) = self.inner.pool.swap(None) {
            pool.shutdown();
        }
        self.inner.shutdown.notify_waiters();
        tracing::info!("network feature shutting down");
    }

    /// Whether shutdown has begun.
    pub fn is_stopping(&self) -> bool {
        self.inner.stopping.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has begun.
    pub async fn stopped(&self) {
        let notified = self.inner.shutdown.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent
        // `begin_shutdown` cannot slip between check and wait.
        notified.as_mut().enable();
        if self.is_stopping() {
            return;
        }
        notified.await;
    }

    /// The published connection pool, if any.
    pub fn pool(&self) -> Option<Arc<ConnectionPool<P::Time>>> {
        if self.is_stopping() {
            return None;
        }
        self.inner.pool.load_full()
    }

    /// The validated configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.inner.config
    }

    /// The runtime providers.
    pub fn providers(&self) -> &P {
        &self.inner.providers
    }

    /// The destination resolver.
    pub fn resolver(&self) -> &dyn DestinationResolver {
        self.inner.resolver.as_ref()
    }

    /// The request builder.
    pub fn requests(&self) -> &RequestBuilder {
        &self.inner.requests
    }
}

/// Builder for [`NetworkFeature`].
pub struct NetworkFeatureBuilder<P: Providers> {
    providers: P,
    config: NetworkConfig,
    resolver: Option<Arc<dyn DestinationResolver>>,
    connector: Option<Arc<dyn Connector>>,
    identity: Option<ServerIdentity>,
}

impl<P: Providers> NetworkFeatureBuilder<P> {
    fn new(providers: P) -> Self {
        Self {
            providers,
            config: NetworkConfig::default(),
            resolver: None,
            connector: None,
            identity: None,
        }
    }

    /// Set the configuration. It is validated on [`build`](Self::build).
    pub fn config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the destination resolver.
    pub fn resolver(mut self, resolver: Arc<dyn DestinationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the connector used by the pool.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set the local server identity.
    pub fn identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Build the feature. The pool is not created until
    /// [`NetworkFeature::prepare`].
    ///
    /// # Errors
    ///
    /// [`NetworkError::MissingComponent`] when the resolver, connector or
    /// identity was not set.
    pub fn build(self) -> Result<NetworkFeature<P>, NetworkError> {
        let resolver = self
            .resolver
            .ok_or(NetworkError::MissingComponent { component: "resolver" })?;
        let connector = self
            .connector
            .ok_or(NetworkError::MissingComponent { component: "connector" })?;
        let identity = self
            .identity
            .ok_or(NetworkError::MissingComponent { component: "identity" })?;

        Ok(NetworkFeature {
            inner: Arc::new(FeatureInner {
                config: self.config.validate(),
                providers: self.providers,
                resolver,
                connector,
                requests: RequestBuilder::new(identity),
                pool: ArcSwapOption::empty(),
                stopping: AtomicBool::new(false),
                shutdown: Notify::new(),
                pruner: Mutex::new(None),
            }),
        })
    }
}
