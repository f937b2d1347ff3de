use super::percent;
use sysinfo::System;

pub struct MemoryCollector {
    sys: System,
}

impl MemoryCollector {
    pub fn new() -> Self {
        let sys = System::new();

        Self { sys }
    }

    /// Share of physical memory not available to new allocations
    pub fn collect(&mut self) -> Option<f32> {
        self.sys.refresh_memory();

        let total = self.sys.total_memory();
        let available = self.sys.available_memory();

        // Some platforms report available as zero; fall back to used memory
        let used = if available > 0 {
            total.saturating_sub(available)
        } else {
            self.sys.used_memory()
        };

        percent(used, total)
    }
}
