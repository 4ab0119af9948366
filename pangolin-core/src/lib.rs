//! Pangolin Core - Shared control protocol types
//!
//! This crate contains the types exchanged with a running `olm` client over its
//! local control socket. They are shared between the socket client
//! (`pangolin-socket`) and the `pangolin` CLI.
//!
//! All CLI-specific functionality (config resolution, process supervision, log
//! files, etc.) lives in the `pangolin` crate.

mod protocol;

pub use protocol::*;
