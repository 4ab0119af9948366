//! Foreground wait loop while a background client comes up.
//!
//! Each tick queries `/status`, reads the log tail and redraws a small
//! preview. The loop ends when the exit condition says so, when the caller's
//! cancel future resolves, or when the spawned process dies first.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use console::{Term, truncate_str};
use pangolin_core::StatusSnapshot;
use pangolin_socket::{ControlClient, ControlError};
use thiserror::Error;

use super::log_file::read_tail;
use super::spawn::ProcessHandle;

pub const POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const PREVIEW_LOG_LINES: usize = 5;
pub const EXIT_LOG_LINES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No status answer yet.
    Starting,
    /// Status answers arrive but the exit condition is not met.
    Polling,
    Completed,
    Cancelled,
}

/// What an exit condition decided for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub stop: bool,
    pub succeeded: bool,
}

impl Verdict {
    pub const CONTINUE: Self = Self {
        stop: false,
        succeeded: false,
    };

    pub fn stop(succeeded: bool) -> Self {
        Self {
            stop: true,
            succeeded,
        }
    }
}

/// Stop successfully once the client reports its interface as registered.
pub fn until_registered(_running: bool, status: Option<&StatusSnapshot>) -> Verdict {
    match status {
        Some(s) if s.registered => Verdict::stop(true),
        _ => Verdict::CONTINUE,
    }
}

/// One frame of the preview.
#[derive(Debug, Clone, Copy)]
pub struct Preview<'a> {
    pub header: &'a str,
    pub log_lines: &'a [String],
    pub status_line: &'a str,
}

pub trait PreviewRenderer {
    fn render(&mut self, preview: &Preview<'_>);
    fn clear(&mut self);
}

/// Redraws the preview in place on a terminal; prints status changes only
/// when stdout is not a terminal.
pub struct TerminalPreview {
    term: Term,
    drawn: usize,
    last_status: Option<String>,
}

impl TerminalPreview {
    pub fn stdout() -> Self {
        Self {
            term: Term::stdout(),
            drawn: 0,
            last_status: None,
        }
    }
}

impl PreviewRenderer for TerminalPreview {
    fn render(&mut self, preview: &Preview<'_>) {
        if !self.term.is_term() {
            if self.last_status.as_deref() != Some(preview.status_line) {
                let _ = self.term.write_line(preview.status_line);
                self.last_status = Some(preview.status_line.to_string());
            }
            return;
        }

        let width = usize::from(self.term.size().1).max(20);
        let mut lines = vec![preview.header.to_string(), String::new()];
        lines.extend(
            preview
                .log_lines
                .iter()
                .map(|l| crate::output::brand_muted(truncate_str(l, width, "…")).to_string()),
        );
        lines.push(String::new());
        lines.push(preview.status_line.to_string());

        if self.drawn > 0 {
            let _ = self.term.clear_last_lines(self.drawn);
        }
        for line in &lines {
            let _ = self.term.write_line(line);
        }
        self.drawn = lines.len();
    }

    fn clear(&mut self) {
        if self.drawn > 0 {
            let _ = self.term.clear_last_lines(self.drawn);
            self.drawn = 0;
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("client process exited before it was ready ({status}){}", format_log_tail(.log_tail))]
    ProcessExited {
        status: ExitStatus,
        log_tail: Vec<String>,
    },
}

fn format_log_tail(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!("\nlast client log lines:\n{}", lines.join("\n"))
    }
}

#[derive(Debug)]
pub struct PollOutcome {
    /// `Completed` or `Cancelled`.
    pub state: PollState,
    pub succeeded: bool,
    pub last_status: Option<StatusSnapshot>,
    /// Every state entered, in order.
    pub transitions: Vec<PollState>,
    /// Cancelled and the client acknowledged `/exit`.
    pub shutdown_acknowledged: bool,
}

impl PollOutcome {
    pub fn completed(&self) -> bool {
        self.state == PollState::Completed
    }
}

type ExitCondition<'a> = Box<dyn Fn(bool, Option<&StatusSnapshot>) -> Verdict + Send + Sync + 'a>;
type StatusFormatter<'a> = Box<dyn Fn(bool, Option<&StatusSnapshot>) -> String + Send + Sync + 'a>;

pub struct StatusPoller<'a> {
    client: &'a ControlClient,
    exit_condition: ExitCondition<'a>,
    formatter: StatusFormatter<'a>,
    header: String,
    log_file: Option<PathBuf>,
    interval: Duration,
}

struct Progress {
    state: PollState,
    transitions: Vec<PollState>,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: PollState::Starting,
            transitions: vec![PollState::Starting],
        }
    }

    fn enter(&mut self, state: PollState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "poll state");
            self.state = state;
            self.transitions.push(state);
        }
    }
}

impl<'a> StatusPoller<'a> {
    pub fn new<C, F>(client: &'a ControlClient, exit_condition: C, formatter: F) -> Self
    where
        C: Fn(bool, Option<&StatusSnapshot>) -> Verdict + Send + Sync + 'a,
        F: Fn(bool, Option<&StatusSnapshot>) -> String + Send + Sync + 'a,
    {
        Self {
            client,
            exit_condition: Box::new(exit_condition),
            formatter: Box::new(formatter),
            header: String::new(),
            log_file: None,
            interval: POLL_INTERVAL,
        }
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    #[cfg(test)]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll until the exit condition stops the loop or `cancel` resolves.
    ///
    /// On cancel or a protocol error, `/exit` is sent exactly once; if the
    /// client cannot be reached the spawned process (when given) is sent
    /// SIGTERM instead.
    pub async fn run<F>(
        &self,
        mut process: Option<&mut ProcessHandle>,
        renderer: &mut dyn PreviewRenderer,
        cancel: F,
    ) -> Result<PollOutcome, PollError>
    where
        F: Future<Output = ()>,
    {
        let mut cancel = std::pin::pin!(cancel);
        let mut progress = Progress::new();
        let mut latest: Option<StatusSnapshot> = None;

        loop {
            let result = tokio::select! {
                biased;
                _ = &mut cancel => None,
                result = self.client.status() => Some(result),
            };
            let Some(result) = result else {
                return Ok(self.cancel(progress, latest, process).await);
            };

            match result {
                Ok(snapshot) => {
                    latest = Some(snapshot);
                    progress.enter(PollState::Polling);
                }
                Err(e) if e.is_protocol() => {
                    tracing::warn!(error = %e, "client answered status with an error, stopping it");
                    self.request_shutdown(process).await;
                    return Err(PollError::Control(e));
                }
                Err(e) => tracing::debug!(error = %e, "client not ready"),
            }

            let running = self.client.probe();
            let verdict = (self.exit_condition)(running, latest.as_ref());
            self.render(renderer, running, latest.as_ref());

            if verdict.stop {
                progress.enter(PollState::Completed);
                return Ok(PollOutcome {
                    state: progress.state,
                    succeeded: verdict.succeeded,
                    last_status: latest,
                    transitions: progress.transitions,
                    shutdown_acknowledged: false,
                });
            }

            if let Some(handle) = process.as_deref_mut()
                && let Some(status) = handle.try_exit_status()
            {
                return Err(PollError::ProcessExited {
                    status,
                    log_tail: read_tail(handle.log_file(), EXIT_LOG_LINES),
                });
            }

            tokio::select! {
                biased;
                _ = &mut cancel => return Ok(self.cancel(progress, latest, process).await),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    fn render(&self, renderer: &mut dyn PreviewRenderer, running: bool, status: Option<&StatusSnapshot>) {
        let log_lines = match &self.log_file {
            Some(path) => read_tail(path, PREVIEW_LOG_LINES),
            None => Vec::new(),
        };
        let status_line = (self.formatter)(running, status);
        renderer.render(&Preview {
            header: &self.header,
            log_lines: &log_lines,
            status_line: &status_line,
        });
    }

    async fn cancel(
        &self,
        mut progress: Progress,
        latest: Option<StatusSnapshot>,
        process: Option<&mut ProcessHandle>,
    ) -> PollOutcome {
        progress.enter(PollState::Cancelled);
        let shutdown_acknowledged = self.request_shutdown(process).await;

        PollOutcome {
            state: progress.state,
            succeeded: false,
            last_status: latest,
            transitions: progress.transitions,
            shutdown_acknowledged,
        }
    }

    /// Ask the client to exit, falling back to SIGTERM. True if it acknowledged.
    async fn request_shutdown(&self, process: Option<&mut ProcessHandle>) -> bool {
        match self.client.exit().await {
            Ok(ack) => {
                tracing::info!(status = %ack.status, "client acknowledged shutdown");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to request client shutdown");
                if let Some(handle) = process {
                    handle.terminate();
                }
                false
            }
        }
    }
}
