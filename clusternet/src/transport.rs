//! Wire-transport seam.
//!
//! clusternet does not speak a wire protocol itself. A [`Connector`] opens
//! [`Connection`]s for an endpoint; a connection sends a [`WireRequest`] and
//! later invokes its completion callback exactly once with an
//! [`ErrorCondition`] and, when the peer answered, a [`WireResponse`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{EndpointSpec, Headers, RestVerb};

/// `200 OK`
pub const STATUS_OK: u16 = 200;
/// `201 Created`
pub const STATUS_CREATED: u16 = 201;
/// `202 Accepted`
pub const STATUS_ACCEPTED: u16 = 202;
/// `204 No Content`
pub const STATUS_NO_CONTENT: u16 = 204;
/// `404 Not Found`
pub const STATUS_NOT_FOUND: u16 = 404;
/// `500 Internal Server Error`
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

/// Application error number for "data source not found".
///
/// Returned with a 404 while a freshly created collection or shard has not
/// yet propagated to the node being asked.
pub const ERROR_DATA_SOURCE_NOT_FOUND: i64 = 1203;

/// Transport-level outcome of a request.
///
/// This is a closed set; every caller-visible failure maps onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCondition {
    /// The request completed and a response was received.
    NoError,
    /// No connection to the endpoint could be established.
    CouldNotConnect,
    /// The connection was closed on request.
    CloseRequested,
    /// The connection was closed by the peer.
    ConnectionClosed,
    /// The request did not complete in time.
    Timeout,
    /// The connection's send queue was full.
    QueueCapacityExceeded,
    /// Reading the response failed.
    ReadError,
    /// Writing the request failed.
    WriteError,
    /// The request was canceled before completion.
    Canceled,
    /// The request path could not be turned into a valid URL.
    MalformedUrl,
    /// The peer violated the wire protocol.
    ProtocolError,
}

impl ErrorCondition {
    /// Stable numeric code for logs and metrics.
    pub fn code(&self) -> u32 {
        match self {
            ErrorCondition::NoError => 0,
            ErrorCondition::CouldNotConnect => 1000,
            ErrorCondition::CloseRequested => 1001,
            ErrorCondition::ConnectionClosed => 1002,
            ErrorCondition::Timeout => 1003,
            ErrorCondition::QueueCapacityExceeded => 1004,
            ErrorCondition::ReadError => 1102,
            ErrorCondition::WriteError => 1103,
            ErrorCondition::Canceled => 1104,
            ErrorCondition::MalformedUrl => 1105,
            ErrorCondition::ProtocolError => 3000,
        }
    }

    /// Whether this is the success condition.
    pub fn is_ok(&self) -> bool {
        *self == ErrorCondition::NoError
    }
}

impl fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCondition::NoError => "no error",
            ErrorCondition::CouldNotConnect => "unable to connect",
            ErrorCondition::CloseRequested => "peer requested connection close",
            ErrorCondition::ConnectionClosed => "connection closed",
            ErrorCondition::Timeout => "request timeout",
            ErrorCondition::QueueCapacityExceeded => "request queue capacity exceeded",
            ErrorCondition::ReadError => "error while reading",
            ErrorCondition::WriteError => "error while writing",
            ErrorCondition::Canceled => "request canceled",
            ErrorCondition::MalformedUrl => "malformed URL",
            ErrorCondition::ProtocolError => "protocol error",
        };
        f.write_str(text)
    }
}

/// Whether a status code counts as success.
pub fn is_success_status(status: u16) -> bool {
    matches!(
        status,
        STATUS_OK | STATUS_CREATED | STATUS_ACCEPTED | STATUS_NO_CONTENT
    )
}

/// A fully prepared request, ready to hand to a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    /// Request method.
    pub verb: RestVerb,
    /// Target database, extracted from the path.
    pub database: String,
    /// Path with any database prefix stripped.
    pub path: String,
    /// Metadata headers.
    pub headers: Headers,
    /// Request body. Shared, never mutated.
    pub payload: Bytes,
    /// Time budget the transport may spend on this request.
    pub timeout: Duration,
}

/// A response as received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: Bytes,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: bool,
    #[serde(rename = "errorNum")]
    error_num: Option<i64>,
}

impl WireResponse {
    /// Create a response with an empty header map.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Application error number carried in the body, if any.
    ///
    /// Recognises bodies of the form `{"error": true, "errorNum": N, ...}`.
    pub fn error_num(&self) -> Option<i64> {
        let body: ErrorBody = serde_json::from_slice(&self.body).ok()?;
        if body.error { body.error_num } else { None }
    }
}

/// Completion callback for a sent request.
pub type RequestCallback = Box<dyn FnOnce(ErrorCondition, Option<WireResponse>) + Send + 'static>;

/// A physical connection to an endpoint.
pub trait Connection: Send + Sync + 'static {
    /// Send a request; `on_complete` is invoked exactly once, possibly on
    /// another thread and possibly before this method returns.
    fn send_request(&self, request: WireRequest, on_complete: RequestCallback);

    /// Whether the connection is unusable and should be discarded.
    fn is_broken(&self) -> bool {
        false
    }

    /// Close the connection. Called when the pool evicts or tears down.
    fn shutdown(&self) {}
}

/// Parameters for opening a new connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// IO thread the connection should be driven by.
    pub io_thread: usize,
    /// Verify peer hosts when using TLS.
    pub verify_hosts: bool,
}

/// Factory for connections, used by the pool.
///
/// Creation is synchronous; connections may connect lazily on first send
/// and report failures as [`ErrorCondition::CouldNotConnect`].
pub trait Connector: Send + Sync + 'static {
    /// Create a connection to `endpoint`.
    fn connect(&self, endpoint: &EndpointSpec, options: ConnectOptions) -> Arc<dyn Connection>;
}
