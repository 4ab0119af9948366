//! Control socket plumbing for the `olm` client.
//!
//! The running client answers HTTP/1.1 requests on a unix domain socket.
//! [`ControlClient`] is the caller side used by the CLI.
//!
//! [`serve_control_connection`], [`ControlRoute`] and [`ControlReply`] are a
//! server-side helper: they answer the same `/status` and `/exit` routes on an
//! accepted connection. The CLI never calls them; they exist for processes that
//! stand in for the client, such as the scripted fakes in this workspace's tests.

mod client;
mod error;
mod server;

pub use client::{ControlClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::ControlError;
pub use hyper::StatusCode;
pub use server::{ControlReply, ControlRoute, serve_control_connection};
