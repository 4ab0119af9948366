mod client;
mod error;
mod persisted;
mod resolver;

pub use client::*;
pub use persisted::*;
