//! Shared fixtures for dispatch integration tests.
//!
//! [`ScriptedConnector`] hands out connections that answer requests from a
//! script of [`Reply`]s, in order, across all connections. Every request is
//! recorded together with the (paused) Tokio time at which it was sent.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clusternet::{
    ConnectOptions, Connection, Connector, EndpointSpec, ErrorCondition, NetworkConfig,
    NetworkFeature, RequestCallback, ServerIdentity, TopologyResolver, WireRequest, WireResponse,
};

/// Body returned for a "data source not found" 404.
pub const NOT_FOUND_BODY: &str =
    r#"{"error":true,"errorNum":1203,"errorMessage":"collection or view not found"}"#;

/// Endpoint the `server:PRMR-1` destination resolves to.
pub const PRIMARY_ENDPOINT: &str = "tcp://10.0.0.1:8529";

/// How a scripted connection answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Invoke the callback with this condition and optional response.
    Respond(ErrorCondition, Option<WireResponse>),
    /// Drop the callback without invoking it.
    Drop,
    /// Keep the callback without invoking it, as a peer that never answers.
    Hold,
}

impl Reply {
    /// Transport-level failure without response.
    pub fn error(error: ErrorCondition) -> Self {
        Reply::Respond(error, None)
    }

    /// Peer answered with `status` and `body`.
    pub fn status(status: u16, body: &str) -> Self {
        Reply::Respond(
            ErrorCondition::NoError,
            Some(WireResponse::new(status, body.to_string())),
        )
    }
}

/// A request observed by a scripted connection.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub endpoint: EndpointSpec,
    pub request: WireRequest,
    pub at: tokio::time::Instant,
}

struct ScriptState {
    script: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    recorded: Mutex<Vec<Recorded>>,
    held: Mutex<Vec<RequestCallback>>,
    connects: AtomicUsize,
}

/// Connector whose connections follow a shared reply script.
#[derive(Clone)]
pub struct ScriptedConnector {
    state: Arc<ScriptState>,
}

impl ScriptedConnector {
    /// Answer from `script`, then with `fallback` once it is exhausted.
    pub fn new(script: impl IntoIterator<Item = Reply>, fallback: Reply) -> Self {
        Self {
            state: Arc::new(ScriptState {
                script: Mutex::new(script.into_iter().collect()),
                fallback,
                recorded: Mutex::new(Vec::new()),
                held: Mutex::new(Vec::new()),
                connects: AtomicUsize::new(0),
            }),
        }
    }

    /// Answer every request the same way.
    pub fn repeating(reply: Reply) -> Self {
        Self::new(Vec::new(), reply)
    }

    /// Requests seen so far.
    pub fn recorded(&self) -> Vec<Recorded> {
        self.state.recorded.lock().expect("recorded lock").clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.state.recorded.lock().expect("recorded lock").len()
    }

    /// Number of callbacks parked by [`Reply::Hold`].
    pub fn held(&self) -> usize {
        self.state.held.lock().expect("held lock").len()
    }

    /// Number of connections opened.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, endpoint: &EndpointSpec, _options: ConnectOptions) -> Arc<dyn Connection> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Arc::new(ScriptedConnection {
            endpoint: endpoint.clone(),
            state: self.state.clone(),
        })
    }
}

struct ScriptedConnection {
    endpoint: EndpointSpec,
    state: Arc<ScriptState>,
}

impl Connection for ScriptedConnection {
    fn send_request(&self, request: WireRequest, on_complete: RequestCallback) {
        self.state.recorded.lock().expect("recorded lock").push(Recorded {
            endpoint: self.endpoint.clone(),
            request,
            at: tokio::time::Instant::now(),
        });
        let reply = self
            .state
            .script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.state.fallback.clone());

        match reply {
            Reply::Respond(error, response) => on_complete(error, response),
            Reply::Drop => drop(on_complete),
            Reply::Hold => self.state.held.lock().expect("held lock").push(on_complete),
        }
    }
}

/// Resolver knowing `server:PRMR-1` and shard `s100` led by it.
pub fn topology() -> Arc<TopologyResolver> {
    let resolver = TopologyResolver::new();
    resolver.set_server_endpoint("PRMR-1", EndpointSpec::from(PRIMARY_ENDPOINT));
    resolver.set_shard_leader("s100", "PRMR-1");
    Arc::new(resolver)
}

/// A prepared feature dispatching through `connector`.
pub fn feature(connector: &ScriptedConnector) -> NetworkFeature {
    let feature = NetworkFeature::builder()
        .config(NetworkConfig::default())
        .resolver(topology())
        .connector(Arc::new(connector.clone()))
        .identity(ServerIdentity::coordinator("CRDN-1"))
        .build()
        .expect("build feature");
    feature.prepare().expect("prepare feature");
    feature
}

/// Time between consecutive recorded requests.
pub fn spacings(recorded: &[Recorded]) -> Vec<Duration> {
    recorded
        .windows(2)
        .map(|pair| pair[1].at.duration_since(pair[0].at))
        .collect()
}

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
