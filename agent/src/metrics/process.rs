//! Live process table

use sysinfo::System;

use crate::protocol::ProcessRow;

/// Collect the live process list with per-process memory and CPU share.
pub fn collect() -> Vec<ProcessRow> {
    let mut sys = System::new_all();
    sys.refresh_all();

    let total_memory = sys.total_memory();

    let mut rows: Vec<ProcessRow> = sys
        .processes()
        .values()
        .map(|process| ProcessRow {
            pid: process.pid().as_u32(),
            name: process.name().to_string_lossy().into_owned(),
            threads: process.tasks().map(|tasks| tasks.len()),
            mem_percent: if total_memory > 0 {
                (process.memory() as f64 / total_memory as f64 * 100.0) as f32
            } else {
                0.0
            },
            cpu_percent: process.cpu_usage(),
        })
        .collect();

    rows.sort_unstable_by_key(|row| row.pid);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_includes_this_process() {
        let rows = collect();
        assert!(!rows.is_empty());

        let own_pid = std::process::id();
        assert!(rows.iter().any(|row| row.pid == own_pid));
    }
}
