use sysinfo::System;

pub struct ProcessCollector {
    sys: System,
}

impl ProcessCollector {
    pub fn new() -> Self {
        Self { sys: System::new() }
    }

    pub fn collect(&mut self) -> usize {
        self.sys.refresh_processes();
        self.sys.processes().len()
    }
}
