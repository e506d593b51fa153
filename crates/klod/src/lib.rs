//! A terminal chat client for the Anthropic Messages API.
//!
//! The library part holds what the `klod` binary needs besides the
//! terminal itself: loading settings and writing the session log.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod session_log;

pub use config::{ConfigError, Settings};
pub use session_log::FileSessionLog;

/// Re-exports of [`klod_core`] crate.
pub mod core {
    pub use klod_core::*;
}
