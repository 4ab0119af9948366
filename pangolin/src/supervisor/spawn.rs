//! Detach by re-exec: start this binary again as `up client` without `-d`,
//! with its output going to a log file and no terminal attached.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;

use crate::config::ClientArgs;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to get executable path: {0}")]
    CurrentExe(#[source] std::io::Error),

    #[error("failed to start client process {}: {source}", executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A started background client.
///
/// The child is kept only so an early exit can be noticed while polling; it is
/// never waited on to completion.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    log_file: PathBuf,
    child: Option<Child>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// `Some` once the process has exited.
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!(pid = self.pid, error = %e, "try_wait failed");
                None
            }
        }
    }

    /// Ask the process to stop. Used when it cannot be reached over its socket.
    pub fn terminate(&mut self) {
        #[cfg(unix)]
        {
            let Ok(pid) = libc::pid_t::try_from(self.pid) else {
                return;
            };
            // SAFETY: kill(2) with a pid we spawned; no memory is touched.
            let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
            if rc != 0 {
                tracing::debug!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
            }
        }

        #[cfg(not(unix))]
        {
            if let Some(child) = self.child.as_mut() {
                let _ = child.kill();
            }
        }
    }

    /// Let the process go without waiting on it.
    pub fn release(mut self) {
        drop(self.child.take());
        tracing::debug!(pid = self.pid, "released background client");
    }
}

/// Arguments for the background `up client` invocation.
///
/// Identity is always passed; every other flag only when the caller set it.
/// `-d` is never forwarded and `--log-file` always is.
pub fn detached_args(args: &ClientArgs, id: &str, secret: &str, log_file: &Path) -> Vec<OsString> {
    let mut out: Vec<OsString> = vec!["up".into(), "client".into()];
    let mut push = |flag: &str, value: &OsStr| {
        out.push(format!("--{flag}").into());
        out.push(value.to_os_string());
    };

    push("id", OsStr::new(id));
    push("secret", OsStr::new(secret));

    let strings = [
        ("endpoint", &args.endpoint),
        ("dns", &args.dns),
        ("interface-name", &args.interface_name),
        ("log-level", &args.log_level),
        ("http-addr", &args.http_addr),
        ("ping-interval", &args.ping_interval),
        ("ping-timeout", &args.ping_timeout),
        ("tls-client-cert", &args.tls_client_cert),
        ("version", &args.protocol_version),
        ("olm-binary", &args.olm_binary),
    ];
    for (flag, value) in strings {
        if let Some(value) = value {
            push(flag, OsStr::new(value));
        }
    }

    if let Some(mtu) = args.mtu {
        push("mtu", OsStr::new(&mtu.to_string()));
    }
    if let Some(path) = &args.socket_path {
        push("socket-path", path.as_os_str());
    }

    // Booleans use `--flag=value` so an explicit `false` survives.
    for (flag, value) in [("enable-api", args.enable_api), ("holepunch", args.holepunch)] {
        if let Some(value) = value {
            out.push(format!("--{flag}={value}").into());
        }
    }

    out.push("--log-file".into());
    out.push(log_file.as_os_str().to_os_string());
    out
}

/// Starts detached copies of an executable.
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    executable: PathBuf,
}

impl ProcessSupervisor {
    /// Supervisor that re-executes the running binary.
    pub fn current() -> Result<Self, SpawnError> {
        let executable = std::env::current_exe().map_err(SpawnError::CurrentExe)?;
        Ok(Self::new(executable))
    }

    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Start `up client` in the background, forcing `log_file`.
    pub fn spawn_client(
        &self,
        args: &ClientArgs,
        id: &str,
        secret: &str,
        log_file: &Path,
    ) -> Result<ProcessHandle, SpawnError> {
        let argv = detached_args(args, id, secret, log_file);
        self.spawn(&argv, log_file)
    }

    /// Start the executable with `argv`, stdio closed, in its own process group
    /// on unix.
    pub fn spawn(&self, argv: &[OsString], log_file: &Path) -> Result<ProcessHandle, SpawnError> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(argv)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            executable: self.executable.clone(),
            source,
        })?;
        let pid = child.id();
        tracing::info!(pid, executable = %self.executable.display(), log_file = %log_file.display(), "started background client");

        Ok(ProcessHandle {
            pid,
            log_file: log_file.to_path_buf(),
            child: Some(child),
        })
    }
}
