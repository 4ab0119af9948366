//! Foreground client run: hand the resolved parameters to the `olm` tunnel
//! executable and stay attached until it exits or we are told to stop.

use std::ffi::OsString;
use std::future::Future;
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::config::ClientStartParameters;

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("failed to start {program}: {source}")]
    Start {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Exited { program: String, status: ExitStatus },
}

/// Something that runs the tunnel in the foreground until it stops.
pub trait TunnelRunner {
    fn run(
        &self,
        params: &ClientStartParameters,
    ) -> impl Future<Output = Result<(), TunnelError>> + Send;
}

/// Runs the `olm` executable as a child process.
#[derive(Debug, Clone)]
pub struct OlmProcess {
    program: OsString,
    leading_args: Vec<OsString>,
}

impl OlmProcess {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Arguments placed before the client flags, e.g. `sudo olm`.
    #[cfg(test)]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// `olm` flags for a resolved run.
pub fn olm_args(params: &ClientStartParameters) -> Vec<String> {
    let mut args = vec![
        "--id".to_string(),
        params.id.clone(),
        "--secret".to_string(),
        params.secret.clone(),
    ];
    if !params.endpoint.is_empty() {
        args.extend(["--endpoint".to_string(), params.endpoint.clone()]);
    }
    args.extend([
        "--mtu".to_string(),
        params.mtu.to_string(),
        "--dns".to_string(),
        params.dns.clone(),
        "--interface-name".to_string(),
        params.interface_name.clone(),
        "--log-level".to_string(),
        params.log_level.clone(),
        format!("--enable-api={}", params.enable_api),
    ]);
    if !params.http_addr.is_empty() {
        args.extend(["--http-addr".to_string(), params.http_addr.clone()]);
    }
    args.extend([
        "--socket-path".to_string(),
        params.socket_path.to_string_lossy().into_owned(),
        "--ping-interval".to_string(),
        params.ping_interval.clone(),
        "--ping-timeout".to_string(),
        params.ping_timeout.clone(),
        format!("--holepunch={}", params.holepunch),
    ]);
    if let Some(cert) = &params.tls_client_cert {
        args.extend(["--tls-client-cert".to_string(), cert.clone()]);
    }
    args.extend(["--version".to_string(), params.version.clone()]);
    args
}

impl TunnelRunner for OlmProcess {
    async fn run(&self, params: &ClientStartParameters) -> Result<(), TunnelError> {
        let program = self.program_name();
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .args(olm_args(params))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TunnelError::Start {
                program: program.clone(),
                source,
            })?;

        tracing::info!(pid = child.id(), program = %program, "tunnel started");
        let stdout = child.stdout.take().map(|out| tokio::spawn(forward_lines(out, false)));
        let stderr = child.stderr.take().map(|err| tokio::spawn(forward_lines(err, true)));

        let waited = tokio::select! {
            status = child.wait() => status,
            _ = shutdown_signal() => {
                tracing::info!("shutdown requested, stopping tunnel");
                terminate(&mut child);
                child.wait().await
            }
        };

        // Drain what the process wrote before exiting.
        for task in [stdout, stderr].into_iter().flatten() {
            let _ = task.await;
        }

        let status = waited.map_err(|source| TunnelError::Wait {
            program: program.clone(),
            source,
        })?;
        tracing::info!(%status, "tunnel stopped");
        if status.success() || terminated_by_sigterm(&status) {
            Ok(())
        } else {
            Err(TunnelError::Exited { program, status })
        }
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R, stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if stderr {
            tracing::warn!(target: "olm", "{line}");
        } else {
            tracing::info!(target: "olm", "{line}");
        }
    }
}

fn terminate(child: &mut tokio::process::Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id().and_then(|id| libc::pid_t::try_from(id).ok()) {
            // SAFETY: kill(2) on our own child's pid.
            unsafe {
                libc::kill(pid, libc::SIGTERM);
            }
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(unix)]
fn terminated_by_sigterm(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal() == Some(libc::SIGTERM)
}

#[cfg(not(unix))]
fn terminated_by_sigterm(_status: &ExitStatus) -> bool {
    false
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientArgs, PersistedConfig};

    fn params() -> ClientStartParameters {
        let args = ClientArgs {
            id: Some("olm_1".to_string()),
            secret: Some("s3cret".to_string()),
            http_addr: Some("127.0.0.1:9452".to_string()),
            ..Default::default()
        };
        ClientStartParameters::resolve(&args, &PersistedConfig::default()).unwrap()
    }

    #[test]
    fn olm_args_carry_every_resolved_setting() {
        let args = olm_args(&params());
        let value = |flag: &str| {
            let at = args.iter().position(|a| a == flag).unwrap();
            args[at + 1].clone()
        };
        assert_eq!(value("--id"), "olm_1");
        assert_eq!(value("--mtu"), "1280");
        assert_eq!(value("--interface-name"), "olm");
        assert_eq!(value("--http-addr"), "127.0.0.1:9452");
        assert_eq!(value("--socket-path"), "/var/run/olm.sock");
        assert_eq!(value("--version"), "1");
        assert!(args.contains(&"--enable-api=true".to_string()));
        assert!(args.contains(&"--holepunch=false".to_string()));
        assert!(!args.contains(&"--endpoint".to_string()));
        assert!(!args.contains(&"--tls-client-cert".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_is_ok() {
        let runner = OlmProcess::new("sh")
            .arg("-c")
            .arg("echo \"olm $1 $2\"; echo warn >&2")
            .arg("olm");
        runner.run(&params()).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_exit_is_reported() {
        let runner = OlmProcess::new("sh").arg("-c").arg("exit 4").arg("olm");
        let err = runner.run(&params()).await.unwrap_err();
        let TunnelError::Exited { status, .. } = err else {
            panic!("expected Exited, got {err:?}");
        };
        assert_eq!(status.code(), Some(4));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let runner = OlmProcess::new("/nonexistent/olm-test-binary");
        let err = runner.run(&params()).await.unwrap_err();
        assert!(matches!(err, TunnelError::Start { .. }));
    }
}
