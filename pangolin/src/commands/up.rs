use std::path::Path;

use pangolin_core::StatusSnapshot;
use pangolin_socket::ControlClient;

use crate::config::{ClientArgs, ClientStartParameters, PersistedConfig, resolve_socket_path};
use crate::output;
use crate::supervisor::{
    PreviewRenderer, ProcessSupervisor, SingleInstanceGuard, StatusPoller, TerminalPreview,
    until_registered,
};
use crate::tunnel::{OlmProcess, TunnelRunner, shutdown_signal};

pub fn run(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(args))
}

async fn run_async(args: ClientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = PersistedConfig::load()?;
    let client = ControlClient::new(resolve_socket_path(args.socket_path.as_ref(), &config));

    SingleInstanceGuard::new(&client).check().await?;
    let (id, secret) = args.identity()?;

    if args.detached {
        let log_file = super::client_log_path(args.log_file.as_ref())?;
        return run_detached(&args, id, secret, &log_file, &client).await;
    }

    let params = ClientStartParameters::resolve(&args, &config)?;
    tracing::info!(?params, "starting client in foreground");
    OlmProcess::new(&params.olm_binary).run(&params).await?;
    Ok(())
}

async fn run_detached(
    args: &ClientArgs,
    id: &str,
    secret: &str,
    log_file: &Path,
    client: &ControlClient,
) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = ProcessSupervisor::current()?;
    let mut handle = supervisor.spawn_client(args, id, secret, log_file)?;
    if output::is_verbose() {
        output::muted(&format!("Client process started (pid {})", handle.pid()));
    }

    let poller = StatusPoller::new(client, until_registered, format_startup_status)
        .header(output::brand_accent("Starting up client...").bold().to_string())
        .log_file(log_file);
    let mut preview = TerminalPreview::stdout();
    let result = poller
        .run(Some(&mut handle), &mut preview, shutdown_signal())
        .await;
    preview.clear();
    handle.release();

    let outcome = result?;
    tracing::info!(
        state = ?outcome.state,
        transitions = ?outcome.transitions,
        succeeded = outcome.succeeded,
        shutdown_acknowledged = outcome.shutdown_acknowledged,
        "client bring-up finished"
    );
    if outcome.completed() && outcome.succeeded {
        let version = outcome.last_status.as_ref().map(|s| s.version.as_str());
        output::success("Client interface created successfully");
        if let Some(version) = version.filter(|v| !v.is_empty()) {
            output::muted(&format!("Client version: {version}"));
        }
    } else {
        output::step("Client process killed");
    }
    output::muted(&format!("Logs: {}", log_file.display()));
    Ok(())
}

/// Status line shown while the background client comes up.
pub fn format_startup_status(running: bool, status: Option<&StatusSnapshot>) -> String {
    match status {
        Some(s) if running && s.registered => {
            format!("{} Registered", output::brand_success("✓"))
        }
        _ => format!("{} Starting", output::brand_warning("○")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console::strip_ansi_codes;

    #[test]
    fn startup_status_reports_registered_only_when_running() {
        let mut snapshot = StatusSnapshot::default();
        let line = |running, s: Option<&StatusSnapshot>| {
            strip_ansi_codes(&format_startup_status(running, s)).into_owned()
        };

        assert_eq!(line(false, None), "○ Starting");
        assert_eq!(line(true, Some(&snapshot)), "○ Starting");
        snapshot.registered = true;
        assert_eq!(line(true, Some(&snapshot)), "✓ Registered");
        assert_eq!(line(false, Some(&snapshot)), "○ Starting");
    }
}
