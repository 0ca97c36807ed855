//! Core types shared by every clusternet component.
//!
//! - [`DestinationId`]: logical name of a cluster member
//! - [`EndpointSpec`]: resolved network endpoint (empty = unresolved)
//! - [`RestVerb`]: request method
//! - [`Headers`]: ordered header map

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered mapping from header name to value.
pub type Headers = BTreeMap<String, String>;

/// Opaque identifier naming a logical cluster member.
///
/// Typical forms are `server:<id>`, `shard:<id>` or a literal endpoint such
/// as `tcp://10.0.0.1:8529`. Interpretation is left to the resolver.
///
/// # Examples
///
/// ```
/// use clusternet_core::DestinationId;
///
/// let dest = DestinationId::from("server:PRMR-1");
/// assert_eq!(dest.as_str(), "server:PRMR-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DestinationId(String);

impl DestinationId {
    /// Create a destination from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DestinationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Resolved network endpoint, e.g. `tcp://10.0.0.1:8529`.
///
/// The empty endpoint is a distinguished value meaning unresolved or
/// unreachable; it is never handed to the connection pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointSpec(String);

impl EndpointSpec {
    /// Create an endpoint from any string-like value.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    /// The distinguished unresolved endpoint.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Whether this is the unresolved endpoint.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw endpoint string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointSpec {
    fn from(endpoint: &str) -> Self {
        Self::new(endpoint)
    }
}

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestVerb {
    /// `DELETE`
    Delete,
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `HEAD`
    Head,
    /// `PATCH`
    Patch,
    /// `OPTIONS`
    Options,
}

impl RestVerb {
    /// Upper-case method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestVerb::Delete => "DELETE",
            RestVerb::Get => "GET",
            RestVerb::Post => "POST",
            RestVerb::Put => "PUT",
            RestVerb::Head => "HEAD",
            RestVerb::Patch => "PATCH",
            RestVerb::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for RestVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_endpoint_is_distinguished() {
        assert!(EndpointSpec::empty().is_empty());
        assert!(EndpointSpec::default().is_empty());
        assert!(!EndpointSpec::from("tcp://127.0.0.1:8529").is_empty());
    }

    #[test]
    fn test_destination_display() {
        let dest = DestinationId::from("shard:s100");
        assert_eq!(dest.to_string(), "shard:s100");
        assert_eq!(DestinationId::from(String::from("shard:s100")), dest);
    }

    #[test]
    fn test_verb_names() {
        assert_eq!(RestVerb::Get.to_string(), "GET");
        assert_eq!(RestVerb::Delete.as_str(), "DELETE");
        assert_eq!(RestVerb::Options.as_str(), "OPTIONS");
    }

    #[test]
    fn test_destination_serializes_as_plain_string() {
        let json = serde_json::to_string(&DestinationId::from("server:CRDN-1"))
            .expect("serialize destination");
        assert_eq!(json, "\"server:CRDN-1\"");
    }
}
