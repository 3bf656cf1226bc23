//! Memory usage

use sysinfo::System;

use crate::protocol::MemoryReport;

/// Collect total, available, and used memory.
pub fn collect() -> MemoryReport {
    let mut sys = System::new();
    sys.refresh_memory();

    let total_bytes = sys.total_memory();
    let available_bytes = sys.available_memory();
    let used_bytes = sys.used_memory();

    MemoryReport {
        total_bytes,
        available_bytes,
        used_bytes,
        used_ratio: if total_bytes > 0 {
            used_bytes as f64 / total_bytes as f64
        } else {
            0.0
        },
    }
}
