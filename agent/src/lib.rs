//! Vigil Agent Library
//!
//! Core modules for the vigil remote system monitor: a UDP request/response
//! server exposing host metrics and a throttled subnet scanner, plus the
//! thin query client.

pub mod app;
pub mod client;
pub mod dispatch;
pub mod errors;
pub mod logs;
pub mod metrics;
pub mod pool;
pub mod protocol;
pub mod scanner;
pub mod server;
pub mod utils;
