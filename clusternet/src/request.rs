//! Request builder.
//!
//! Turns a caller's `(verb, path, payload, timeout, headers)` into a
//! [`WireRequest`]:
//!
//! 1. A leading `/_db/<name>` segment is stripped from the path and becomes
//!    the target database; without one the system database is targeted.
//! 2. Caller headers are copied, then the causal timestamp header and the
//!    cluster origin header are written on top. Callers can never override
//!    either of them.
//! 3. The wire timeout is whatever budget the caller passes in; the
//!    retrying path passes the remaining budget, not the original total.

use std::time::Duration;

use bytes::Bytes;

use crate::clock::{HLC, create_hlc, encode_timestamp};
use crate::transport::WireRequest;
use crate::{Headers, RestVerb};

/// Database targeted when the path names none.
pub const SYSTEM_DATABASE: &str = "_system";

/// Header carrying the sender's hybrid logical clock timestamp.
pub const HLC_HEADER: &str = "x-cluster-hlc";

/// Header carrying the sender's cluster identity.
pub const SOURCE_HEADER: &str = "x-cluster-source";

const DATABASE_PREFIX: &str = "/_db/";

/// Role of the local server in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    /// Role not (yet) known.
    Undefined,
    /// Stand-alone server.
    Single,
    /// Query coordinator.
    Coordinator,
    /// Data node.
    DbServer,
    /// Consensus agent.
    Agent,
}

/// Identity of the local server, stamped onto outgoing requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    /// Role of this server.
    pub role: ServerRole,
    /// Cluster-wide server id.
    pub server_id: String,
    /// Id of the local agent instance, for agents that have one running.
    pub agent_id: Option<String>,
}

impl ServerIdentity {
    /// Identity of a coordinator.
    pub fn coordinator(server_id: impl Into<String>) -> Self {
        Self {
            role: ServerRole::Coordinator,
            server_id: server_id.into(),
            agent_id: None,
        }
    }

    /// Identity of a data node.
    pub fn db_server(server_id: impl Into<String>) -> Self {
        Self {
            role: ServerRole::DbServer,
            server_id: server_id.into(),
            agent_id: None,
        }
    }

    /// Identity of an agent. `agent_id` is `None` while no local agent
    /// instance is available.
    pub fn agent(server_id: impl Into<String>, agent_id: Option<String>) -> Self {
        Self {
            role: ServerRole::Agent,
            server_id: server_id.into(),
            agent_id,
        }
    }

    /// Identity of a stand-alone server.
    pub fn single(server_id: impl Into<String>) -> Self {
        Self {
            role: ServerRole::Single,
            server_id: server_id.into(),
            agent_id: None,
        }
    }

    /// Value of the origin header, if this role sends one.
    pub fn origin(&self) -> Option<String> {
        match self.role {
            ServerRole::Coordinator | ServerRole::DbServer => Some(self.server_id.clone()),
            ServerRole::Agent => self.agent_id.as_ref().map(|id| format!("AGENT-{}", id)),
            ServerRole::Single | ServerRole::Undefined => None,
        }
    }
}

/// Split a `/_db/<name>/rest` path into database name and remaining path.
///
/// Returns `(None, path)` when the path carries no (non-empty) database
/// segment.
pub fn split_database_path(path: &str) -> (Option<&str>, &str) {
    let Some(rest) = path.strip_prefix(DATABASE_PREFIX) else {
        return (None, path);
    };
    let (name, remainder) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, "/"),
    };
    if name.is_empty() {
        (None, remainder)
    } else {
        (Some(name), remainder)
    }
}

fn is_injected_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(HLC_HEADER) || name.eq_ignore_ascii_case(SOURCE_HEADER)
}

/// Builds wire requests for the local server.
pub struct RequestBuilder {
    identity: ServerIdentity,
    hlc: HLC,
}

impl RequestBuilder {
    /// Create a builder whose clock is keyed by the identity's server id.
    pub fn new(identity: ServerIdentity) -> Self {
        let hlc = create_hlc(&identity.server_id);
        Self { identity, hlc }
    }

    /// The identity stamped on requests.
    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    /// The clock used for causal timestamps.
    pub fn hlc(&self) -> &HLC {
        &self.hlc
    }

    /// Assemble a wire request.
    pub fn build(
        &self,
        verb: RestVerb,
        path: &str,
        payload: Bytes,
        timeout: Duration,
        headers: &Headers,
    ) -> WireRequest {
        let (database, path) = split_database_path(path);

        // Header names are case-insensitive on the wire: drop every caller
        // spelling of the injected keys, not just the lowercase one.
        let mut meta: Headers = headers
            .iter()
            .filter(|(name, _)| !is_injected_header(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        meta.insert(
            HLC_HEADER.to_string(),
            encode_timestamp(&self.hlc.new_timestamp()),
        );
        if let Some(origin) = self.identity.origin() {
            meta.insert(SOURCE_HEADER.to_string(), origin);
        }

        WireRequest {
            verb,
            database: database.unwrap_or(SYSTEM_DATABASE).to_string(),
            path: path.to_string(),
            headers: meta,
            payload,
            timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::decode_timestamp_header;

    fn build(identity: ServerIdentity, path: &str, headers: &Headers) -> WireRequest {
        RequestBuilder::new(identity).build(
            RestVerb::Put,
            path,
            Bytes::from_static(b"{\"a\":1}"),
            Duration::from_secs(3),
            headers,
        )
    }

    #[test]
    fn test_split_database_path() {
        assert_eq!(
            split_database_path("/_db/shop/_api/document/c/1"),
            (Some("shop"), "/_api/document/c/1")
        );
        assert_eq!(split_database_path("/_db/shop"), (Some("shop"), "/"));
        assert_eq!(split_database_path("/_api/version"), (None, "/_api/version"));
        assert_eq!(split_database_path("/_db//_api/x"), (None, "/_api/x"));
        assert_eq!(split_database_path("/_dbx/foo"), (None, "/_dbx/foo"));
    }

    #[test]
    fn test_database_is_stripped_from_path() {
        let request = build(
            ServerIdentity::coordinator("CRDN-1"),
            "/_db/shop/_api/document/c/1",
            &Headers::new(),
        );
        assert_eq!(request.database, "shop");
        assert_eq!(request.path, "/_api/document/c/1");
        assert_eq!(request.verb, RestVerb::Put);
        assert_eq!(request.timeout, Duration::from_secs(3));
        assert_eq!(&request.payload[..], b"{\"a\":1}");
    }

    #[test]
    fn test_system_database_default() {
        let request = build(
            ServerIdentity::coordinator("CRDN-1"),
            "/_api/version",
            &Headers::new(),
        );
        assert_eq!(request.database, SYSTEM_DATABASE);
        assert_eq!(request.path, "/_api/version");
    }

    #[test]
    fn test_injected_headers_win_over_caller_headers() {
        let mut headers = Headers::new();
        headers.insert(HLC_HEADER.to_string(), "1".to_string());
        headers.insert(SOURCE_HEADER.to_string(), "spoofed".to_string());
        headers.insert("x-custom".to_string(), "kept".to_string());

        let request = build(ServerIdentity::db_server("PRMR-1"), "/_api/x", &headers);

        assert_eq!(request.headers.get(SOURCE_HEADER).map(String::as_str), Some("PRMR-1"));
        assert_eq!(request.headers.get("x-custom").map(String::as_str), Some("kept"));
        let hlc = request
            .headers
            .get(HLC_HEADER)
            .and_then(|v| decode_timestamp_header(v))
            .expect("hlc header present");
        assert!(hlc.as_u64() > 1);
    }

    #[test]
    fn test_injected_headers_win_regardless_of_case() {
        let mut headers = Headers::new();
        headers.insert("X-Cluster-Source".to_string(), "spoofed".to_string());
        headers.insert("X-CLUSTER-HLC".to_string(), "1".to_string());
        headers.insert("X-Request-Id".to_string(), "r-1".to_string());

        let request = build(ServerIdentity::coordinator("CRDN-1"), "/_api/x", &headers);

        let injected: Vec<_> = request
            .headers
            .iter()
            .filter(|(name, _)| is_injected_header(name))
            .collect();
        assert_eq!(injected.len(), 2);
        assert_eq!(request.headers.get(SOURCE_HEADER).map(String::as_str), Some("CRDN-1"));
        assert_ne!(request.headers.get(HLC_HEADER).map(String::as_str), Some("1"));
        assert_eq!(request.headers.get("X-Request-Id").map(String::as_str), Some("r-1"));
        assert!(!request.headers.values().any(|value| value == "spoofed"));
    }

    #[test]
    fn test_timestamps_increase_between_requests() {
        let builder = RequestBuilder::new(ServerIdentity::coordinator("CRDN-1"));
        let stamp = |request: &WireRequest| {
            request
                .headers
                .get(HLC_HEADER)
                .and_then(|v| decode_timestamp_header(v))
                .expect("hlc header present")
        };

        let first = builder.build(RestVerb::Get, "/", Bytes::new(), Duration::ZERO, &Headers::new());
        let second = builder.build(RestVerb::Get, "/", Bytes::new(), Duration::ZERO, &Headers::new());
        assert!(stamp(&second) > stamp(&first));
    }

    #[test]
    fn test_agent_origin() {
        let request = build(
            ServerIdentity::agent("AGNT-1", Some("a1b2".to_string())),
            "/_api/agency/read",
            &Headers::new(),
        );
        assert_eq!(
            request.headers.get(SOURCE_HEADER).map(String::as_str),
            Some("AGENT-a1b2")
        );
    }

    #[test]
    fn test_origin_omitted_without_agent_or_cluster_role() {
        let mut headers = Headers::new();
        headers.insert(SOURCE_HEADER.to_string(), "spoofed".to_string());

        for identity in [
            ServerIdentity::agent("AGNT-1", None),
            ServerIdentity::single("SNGL-1"),
        ] {
            let request = build(identity, "/", &headers);
            assert!(!request.headers.contains_key(SOURCE_HEADER));
            assert!(request.headers.contains_key(HLC_HEADER));
        }
    }
}
