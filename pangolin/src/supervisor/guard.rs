use std::path::PathBuf;

use pangolin_socket::{ControlClient, ControlError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("A client is already running (version {version}). Stop it with 'pangolin down client' first.")]
    AlreadyRunning { version: String },

    /// The socket exists but the process behind it did not answer. Treated as
    /// running so two tunnels never fight over one interface.
    #[error(
        "A client appears to be running (socket {} exists but is unresponsive). Stop it or remove the stale socket file.",
        path.display()
    )]
    AppearsRunning {
        path: PathBuf,
        #[source]
        source: ControlError,
    },
}

/// Refuses to start a second client on the same control socket.
#[derive(Debug, Clone, Copy)]
pub struct SingleInstanceGuard<'a> {
    client: &'a ControlClient,
}

impl<'a> SingleInstanceGuard<'a> {
    pub fn new(client: &'a ControlClient) -> Self {
        Self { client }
    }

    pub async fn check(&self) -> Result<(), GuardError> {
        if !self.client.probe() {
            return Ok(());
        }

        match self.client.status().await {
            Ok(snapshot) => Err(GuardError::AlreadyRunning {
                version: snapshot.version,
            }),
            // Removed between probe and request: nothing is running.
            Err(e) if e.is_unreachable() => Ok(()),
            Err(source) => Err(GuardError::AppearsRunning {
                path: self.client.socket_path().to_path_buf(),
                source,
            }),
        }
    }
}
