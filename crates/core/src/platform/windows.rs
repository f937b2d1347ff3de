use super::PlatformProvider;
use crate::error::{CoreError, Result};

pub struct WindowsProvider;

impl WindowsProvider {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformProvider for WindowsProvider {
    fn load_average(&self) -> Result<[f64; 3]> {
        // No run-queue load average on Windows; sysinfo reports zeros here,
        // which would read as an idle machine.
        Err(CoreError::sampling_unavailable("load_average"))
    }

    fn platform_name(&self) -> &'static str {
        "windows"
    }
}
