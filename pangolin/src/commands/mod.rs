pub mod down;
pub mod logs;
pub mod status;
pub mod up;

use std::path::PathBuf;

use pangolin_socket::ControlClient;

use crate::config::{PersistedConfig, resolve_socket_path};

/// Control client for the socket named by `--socket-path`, the config, or the
/// default, in that order.
pub(crate) fn control_client(socket_path: Option<&PathBuf>) -> Result<ControlClient, Box<dyn std::error::Error>> {
    let config = PersistedConfig::load()?;
    Ok(ControlClient::new(resolve_socket_path(socket_path, &config)))
}

/// Log file named by `--log-file`, else `~/.pangolin/logs/client.log`.
pub(crate) fn client_log_path(log_file: Option<&PathBuf>) -> Result<PathBuf, std::io::Error> {
    match log_file {
        Some(path) => Ok(path.clone()),
        None => crate::paths::default_client_log_path(),
    }
}
