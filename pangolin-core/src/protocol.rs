//! Control protocol types for the `olm` client's local socket
//!
//! The client exposes a small HTTP-shaped API on a unix domain socket. These
//! types mirror its JSON bodies (camelCase keys).

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Socket path used when neither a flag nor the persisted config names one.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/olm.sock";

/// `GET` this path for a [`StatusSnapshot`].
pub const STATUS_PATH: &str = "/status";

/// `POST` to this path to ask the client to shut down; answers [`ExitResponse`].
pub const EXIT_PATH: &str = "/exit";

/// Decoded `/status` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub connected: bool,

    /// True once the data-plane interface exists.
    #[serde(default)]
    pub registered: bool,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub org_id: String,

    #[serde(
        default,
        rename = "tunnelIP",
        skip_serializing_if = "Option::is_none"
    )]
    pub tunnel_ip: Option<String>,

    /// Peers keyed by peer identifier. The client sends `null` when it has none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub peers: BTreeMap<String, PeerStatus>,
}

/// One peer as reported inside a [`StatusSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerStatus {
    #[serde(default)]
    pub site_id: u64,

    #[serde(default)]
    pub connected: bool,

    /// Round-trip time in nanoseconds; 0 when unmeasured.
    #[serde(default)]
    pub rtt: i64,

    /// RFC 3339 timestamp, kept verbatim.
    #[serde(default)]
    pub last_seen: String,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub is_relay: bool,
}

/// Acknowledgement returned by `/exit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitResponse {
    #[serde(default)]
    pub status: String,
}

impl StatusSnapshot {
    /// Number of peers currently reported as connected.
    pub fn connected_peers(&self) -> usize {
        self.peers.values().filter(|p| p.connected).count()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
