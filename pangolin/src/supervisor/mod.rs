//! Lifecycle of the background client: refuse duplicates, detach a copy of
//! this binary, wait for it to come up, and keep its log file tidy.

mod guard;
mod log_file;
mod poller;
mod spawn;

#[cfg(test)]
pub(crate) mod fake_olm;

pub use guard::SingleInstanceGuard;
pub use log_file::{LogFile, LogFileError, read_tail};
pub use poller::{PreviewRenderer, StatusPoller, TerminalPreview, until_registered};
pub use spawn::ProcessSupervisor;
