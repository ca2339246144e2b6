//! Headless host integration: drive a session from a native shell over a
//! newline-delimited JSON protocol on stdin/stdout.

pub mod adapters;
pub mod contract;
pub mod stdio;

pub use stdio::{run_bridge, run_stdio_bridge};
