use crate::Collector;
use anyhow::Result;
use metrix_common::MetricRecord;
use sysinfo::System;

/// Host memory in bytes and per-core CPU utilisation in percent.
///
/// Cores are reported as `CPUutilization1`..`CPUutilizationN`.
pub struct SystemCollector {
    system: System,
}

impl SystemCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SystemCollector {
    fn name(&self) -> &str {
        "system"
    }

    fn collect(&mut self) -> Result<Vec<MetricRecord>> {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        let mut records = vec![
            MetricRecord::gauge("TotalMemory", self.system.total_memory() as f64),
            MetricRecord::gauge("FreeMemory", self.system.free_memory() as f64),
            MetricRecord::gauge("UsedMemory", self.system.used_memory() as f64),
            MetricRecord::gauge("AvailableMemory", self.system.available_memory() as f64),
        ];
        for (i, cpu) in self.system.cpus().iter().enumerate() {
            records.push(MetricRecord::gauge(
                format!("CPUutilization{}", i + 1),
                f64::from(cpu.cpu_usage()).max(0.0),
            ));
        }
        Ok(records)
    }
}
