use crate::Collector;
use anyhow::{anyhow, Result};
use metrix_common::MetricRecord;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Resource usage of the agent process itself.
pub struct ProcessCollector {
    system: System,
    pid: Pid,
}

impl ProcessCollector {
    pub fn new() -> Result<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("cannot resolve own pid: {e}"))?;
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        Ok(Self { system, pid })
    }
}

impl Collector for ProcessCollector {
    fn name(&self) -> &str {
        "process"
    }

    fn collect(&mut self) -> Result<Vec<MetricRecord>> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| anyhow!("process {} not visible", self.pid))?;

        let disk = process.disk_usage();
        Ok(vec![
            MetricRecord::gauge("ProcessResidentMemory", process.memory() as f64),
            MetricRecord::gauge("ProcessVirtualMemory", process.virtual_memory() as f64),
            MetricRecord::gauge("ProcessCpuUsage", f64::from(process.cpu_usage()).max(0.0)),
            MetricRecord::gauge("ProcessRunTime", process.run_time() as f64),
            MetricRecord::gauge("ProcessDiskReadTotal", disk.total_read_bytes as f64),
            MetricRecord::gauge("ProcessDiskWrittenTotal", disk.total_written_bytes as f64),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_own_process() {
        let mut collector = ProcessCollector::new().unwrap();
        let records = collector.collect().unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].id, "ProcessResidentMemory");
        for record in &records {
            record.validate().unwrap();
        }
    }
}
