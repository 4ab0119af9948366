use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to the control socket.
#[derive(Debug, Error)]
pub enum ControlError {
    /// No socket file: the client is not running.
    #[error("socket does not exist: {} (is the client running?)", path.display())]
    Unreachable { path: PathBuf },

    /// The socket file exists but the exchange failed or timed out.
    #[error("failed to connect to socket {}: {reason}", path.display())]
    Unresponsive { path: PathBuf, reason: String },

    /// The client answered with something other than 200.
    #[error("unexpected status code {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The client answered 200 with a body we could not decode.
    #[error("failed to decode response: {0}")]
    InvalidBody(#[source] serde_json::Error),

    #[error("failed to create request: {0}")]
    Request(String),
}

impl ControlError {
    /// True when the socket file is missing.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// True when the socket exists but did not complete the exchange.
    pub fn is_unresponsive(&self) -> bool {
        matches!(self, Self::Unresponsive { .. })
    }

    /// True when a reachable client returned a bad status or body.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { .. } | Self::InvalidBody(_))
    }
}
