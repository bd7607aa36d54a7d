//! # Net Toolbox
//!
//! A self-hosted web console for long-running network diagnostics. A browser
//! client attaches over a WebSocket, starts one diagnostic command at a time
//! (ping, whois, nslookup, dig, port probe, host, ipcalc), and receives the
//! command's output line by line, classified and colorized, until it finishes
//! or is stopped.
//!
//! ## Modules
//!
//! - `catalog` - Static mapping from tool to command line, timeout ceiling, and run framing
//! - `classify` - Per-tool line classification rules producing colorized annotations
//! - `config` - Server configuration with optional TOML file loading
//! - `process` - Spawning, line-streaming, and terminating one external process
//! - `server` - axum HTTP/WebSocket surface and the one-shot geolocation helper
//! - `session` - Per-connection state machine enforcing single-flight execution

pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod process;
pub mod server;
pub mod session;

pub use error::{Error, Result};
