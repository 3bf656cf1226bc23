//! Read-only system metrics providers.
//!
//! Each provider collects fresh data on every call and never caches.
//! Transient per-item failures (a vanished process, an unreadable
//! directory entry) are reported as zero/absent values; only a provider
//! that cannot run at all returns an error.

pub mod cpu;
pub mod data_usage;
pub mod disk;
pub mod memory;
pub mod network;
pub mod process;
pub mod system;
