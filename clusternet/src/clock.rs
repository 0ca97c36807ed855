//! Hybrid logical clock for causal timestamps on outgoing requests.
//!
//! Every outgoing request carries a fresh HLC timestamp so receivers can
//! advance their own clocks and keep happened-before ordering across nodes.
//! The clock ID is derived from the local server id with blake3, so a node
//! keeps the same ID across restarts.

// Re-export core uhlc types for convenience
pub use uhlc::HLC;
pub use uhlc::NTP64;
pub use uhlc::Timestamp as HlcTimestamp;

/// Create an HLC instance from a server identifier.
pub fn create_hlc(server_id: &str) -> HLC {
    let hash = blake3::hash(server_id.as_bytes());
    let bytes = hash.as_bytes();
    let mut id_bytes = [0u8; 16];
    id_bytes.copy_from_slice(&bytes[..16]);
    match uhlc::ID::try_from(id_bytes) {
        Ok(id) => uhlc::HLCBuilder::new().with_id(id).build(),
        // Only an all-zero hash prefix is rejected.
        Err(_) => uhlc::HLCBuilder::new().build(),
    }
}

/// Encode a timestamp for the causal timestamp header.
///
/// Only the 64-bit NTP time is transmitted; the clock ID stays local.
pub fn encode_timestamp(timestamp: &HlcTimestamp) -> String {
    timestamp.get_time().as_u64().to_string()
}

/// Decode a causal timestamp header value.
pub fn decode_timestamp_header(value: &str) -> Option<NTP64> {
    value.trim().parse::<u64>().ok().map(NTP64)
}
