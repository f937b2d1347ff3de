//! Local resource sampling.
//!
//! [`SystemSampler`] coordinates one collector per resource. Each collector
//! keeps its own sysinfo handle so counters and deltas survive between
//! samples. A collector that cannot read its resource yields `None` and the
//! metric name is listed in [`SystemMetrics::unavailable`]; sampling as a
//! whole never fails.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;
pub mod process;
pub mod system;

pub use cpu::CpuCollector;
pub use disk::DiskCollector;
pub use memory::MemoryCollector;
pub use network::NetworkCollector;
pub use process::ProcessCollector;
pub use system::LoadCollector;

use crate::{model::SystemMetrics, platform::PlatformProvider};
use chrono::Utc;
use tracing::debug;

/// Reads all local resource counters into a [`SystemMetrics`] snapshot
pub struct SystemSampler {
    cpu: CpuCollector,
    memory: MemoryCollector,
    disk: DiskCollector,
    network: NetworkCollector,
    process: ProcessCollector,
    load: LoadCollector,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self::with_platform(crate::platform::get_platform_provider())
    }

    pub fn with_platform(platform: Box<dyn PlatformProvider>) -> Self {
        let mut sampler = Self {
            cpu: CpuCollector::new(),
            memory: MemoryCollector::new(),
            disk: DiskCollector::new(),
            network: NetworkCollector::new(),
            process: ProcessCollector::new(),
            load: LoadCollector::new(platform),
        };
        sampler.init();
        sampler
    }

    /// Take a CPU baseline so the first sample has a reference point.
    fn init(&mut self) {
        self.cpu.init();
    }

    pub fn sample(&mut self) -> SystemMetrics {
        let timestamp = Utc::now();

        let cpu_percent = self.cpu.collect();
        let memory_percent = self.memory.collect();
        let disk_percent = self.disk.collect();
        let network_io = self.network.collect();
        let process_count = self.process.collect();
        let load_average = self.load.collect();

        let mut unavailable = Vec::new();
        if cpu_percent.is_none() {
            unavailable.push("cpu".to_string());
        }
        if memory_percent.is_none() {
            unavailable.push("memory".to_string());
        }
        if disk_percent.is_none() {
            unavailable.push("disk".to_string());
        }
        if load_average.is_none() {
            unavailable.push("load_average".to_string());
        }

        debug!(
            cpu = ?cpu_percent,
            memory = ?memory_percent,
            disk = ?disk_percent,
            processes = process_count,
            "Sampled system metrics"
        );

        SystemMetrics {
            timestamp,
            cpu_percent,
            memory_percent,
            disk_percent,
            network_io,
            process_count,
            load_average,
            unavailable,
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

/// `used / total` as a percentage, `None` when nothing is reported.
pub(crate) fn percent(used: u64, total: u64) -> Option<f32> {
    if total == 0 {
        None
    } else {
        Some((used as f64 / total as f64 * 100.0) as f32)
    }
}
