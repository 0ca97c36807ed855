//! Destination → endpoint resolution.
//!
//! A destination names a logical cluster member; the resolver maps it to the
//! endpoint currently serving it. Resolution is a pure lookup against the
//! resolver's topology snapshot and never retries on its own: the retrying
//! dispatch path re-resolves on every attempt, so topology updates between
//! attempts are picked up naturally.
//!
//! # Destination forms
//!
//! | Form | Resolution |
//! |------|------------|
//! | `tcp://…`, `ssl://…`, `unix://…` | the destination itself |
//! | `server:<id>` | server endpoint table |
//! | `shard:<id>` | shard leader, then server endpoint table |

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::ResolveError;
use crate::{DestinationId, EndpointSpec};

const ENDPOINT_SCHEMES: [&str; 3] = ["tcp://", "ssl://", "unix://"];
const SERVER_PREFIX: &str = "server:";
const SHARD_PREFIX: &str = "shard:";

/// Maps destinations to endpoints.
pub trait DestinationResolver: Send + Sync + 'static {
    /// Resolve `destination` to a non-empty endpoint.
    fn resolve(&self, destination: &DestinationId) -> Result<EndpointSpec, ResolveError>;
}

#[derive(Default)]
struct Topology {
    servers: HashMap<String, EndpointSpec>,
    shard_leaders: HashMap<String, String>,
}

/// Resolver backed by an in-memory view of cluster topology.
///
/// The topology owner updates it as servers join, move or leave; dispatches
/// in flight observe the change on their next attempt.
#[derive(Default)]
pub struct TopologyResolver {
    topology: RwLock<Topology>,
}

impl TopologyResolver {
    /// Create an empty resolver. Only literal endpoints resolve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the endpoint of a server.
    pub fn set_server_endpoint(&self, server_id: impl Into<String>, endpoint: EndpointSpec) {
        self.topology
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .servers
            .insert(server_id.into(), endpoint);
    }

    /// Forget a server.
    pub fn remove_server(&self, server_id: &str) {
        self.topology
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .servers
            .remove(server_id);
    }

    /// Set (or replace) the leader of a shard.
    pub fn set_shard_leader(&self, shard_id: impl Into<String>, server_id: impl Into<String>) {
        self.topology
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .shard_leaders
            .insert(shard_id.into(), server_id.into());
    }

    fn server_endpoint(
        topology: &Topology,
        server_id: &str,
        destination: &DestinationId,
    ) -> Result<EndpointSpec, ResolveError> {
        match topology.servers.get(server_id) {
            Some(endpoint) if !endpoint.is_empty() => Ok(endpoint.clone()),
            Some(_) => Err(ResolveError::Unreachable {
                destination: destination.clone(),
            }),
            None => Err(ResolveError::UnknownDestination {
                destination: destination.clone(),
            }),
        }
    }
}

impl DestinationResolver for TopologyResolver {
    fn resolve(&self, destination: &DestinationId) -> Result<EndpointSpec, ResolveError> {
        let dest = destination.as_str();

        if ENDPOINT_SCHEMES
            .iter()
            .any(|scheme| dest.len() > scheme.len() && dest.starts_with(scheme))
        {
            return Ok(EndpointSpec::new(dest));
        }

        let topology = self.topology.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(server_id) = dest.strip_prefix(SERVER_PREFIX) {
            return Self::server_endpoint(&topology, server_id, destination);
        }

        if let Some(shard_id) = dest.strip_prefix(SHARD_PREFIX) {
            let Some(leader) = topology.shard_leaders.get(shard_id) else {
                tracing::debug!(destination = %destination, "no leader known for shard");
                return Err(ResolveError::UnknownDestination {
                    destination: destination.clone(),
                });
            };
            return Self::server_endpoint(&topology, leader, destination);
        }

        Err(ResolveError::UnknownDestination {
            destination: destination.clone(),
        })
    }
}
