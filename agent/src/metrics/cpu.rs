//! CPU identity and load

use sysinfo::System;

use crate::protocol::CpuReport;

/// Collect CPU info and per-core load.
pub fn collect() -> CpuReport {
    let mut sys = System::new_all();
    sys.refresh_all();

    let cpus = sys.cpus();

    CpuReport {
        brand: cpus
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default(),
        arch: System::cpu_arch(),
        bits: (std::mem::size_of::<usize>() * 8) as u32,
        physical_cores: System::physical_core_count().unwrap_or(0),
        logical_cores: cpus.len(),
        frequency_mhz: cpus.first().map(|cpu| cpu.frequency()).unwrap_or(0),
        max_frequency_mhz: cpus.iter().map(|cpu| cpu.frequency()).max().unwrap_or(0),
        usage_per_core: cpus
            .iter()
            .map(|cpu| cpu.cpu_usage().clamp(0.0, 100.0).round() / 100.0)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_reports_cores() {
        let report = collect();
        assert!(report.logical_cores > 0);
        assert_eq!(report.usage_per_core.len(), report.logical_cores);
        assert!(report.bits == 32 || report.bits == 64);
        assert!(report
            .usage_per_core
            .iter()
            .all(|load| (0.0..=1.0).contains(load)));
    }
}
