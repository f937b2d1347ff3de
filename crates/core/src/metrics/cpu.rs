use sysinfo::System;

pub struct CpuCollector {
    sys: System,
}

impl CpuCollector {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();

        Self { sys }
    }

    pub fn init(&mut self) {
        // Usage is computed between two refreshes
        self.sys.refresh_cpu();
    }

    /// Overall CPU usage across all cores since the previous refresh
    pub fn collect(&mut self) -> Option<f32> {
        self.sys.refresh_cpu();

        if !sysinfo::IS_SUPPORTED_SYSTEM || self.sys.cpus().is_empty() {
            return None;
        }

        let usage = self.sys.global_cpu_info().cpu_usage();
        usage.is_finite().then(|| usage.clamp(0.0, 100.0))
    }
}
