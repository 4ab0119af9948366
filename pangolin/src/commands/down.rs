use std::path::PathBuf;

use pangolin_core::ExitResponse;
use pangolin_socket::{ControlClient, ControlError};

use crate::output;

pub fn run(socket_path: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let client = super::control_client(socket_path)?;
    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(stop(&client))? {
        None => output::step("No client is currently running"),
        Some(ack) if ack.status.is_empty() => output::success("Client shutdown requested"),
        Some(ack) => output::success(&format!("Client shutdown requested: {}", ack.status)),
    }
    Ok(())
}

/// Ask a running client to exit. `None` when no client is running.
pub async fn stop(client: &ControlClient) -> Result<Option<ExitResponse>, ControlError> {
    if !client.probe() {
        return Ok(None);
    }
    match client.exit().await {
        Ok(ack) => Ok(Some(ack)),
        // Gone between probe and request.
        Err(e) if e.is_unreachable() => Ok(None),
        Err(e) => Err(e),
    }
}
