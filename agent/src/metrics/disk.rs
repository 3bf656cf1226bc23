//! Disk usage for the root mount

use sysinfo::Disks;

use crate::errors::AgentError;
use crate::protocol::DiskReport;

/// Collect usage of the root mount (the first disk when no root mount is
/// listed, as on Windows).
pub fn collect() -> Result<DiskReport, AgentError> {
    let disks = Disks::new_with_refreshed_list();

    let disk = disks
        .iter()
        .find(|disk| disk.mount_point() == std::path::Path::new("/"))
        .or_else(|| disks.iter().next())
        .ok_or_else(|| AgentError::Unavailable("no disks found".to_string()))?;

    let total_bytes = disk.total_space();
    let available_bytes = disk.available_space();
    let used_bytes = total_bytes.saturating_sub(available_bytes);

    Ok(DiskReport {
        total_bytes,
        available_bytes,
        used_bytes,
        used_ratio: if total_bytes > 0 {
            used_bytes as f64 / total_bytes as f64
        } else {
            0.0
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_reports_consistent_totals() {
        // Containers may expose no disks at all; that surfaces as Unavailable.
        let report = match collect() {
            Ok(report) => report,
            Err(AgentError::Unavailable(_)) => return,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert!(report.total_bytes > 0);
        assert_eq!(
            report.used_bytes,
            report.total_bytes - report.available_bytes
        );
        assert!((0.0..=1.0).contains(&report.used_ratio));
    }
}
