use super::PlatformProvider;
use crate::error::Result;

pub struct MacosProvider;

impl MacosProvider {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformProvider for MacosProvider {
    fn load_average(&self) -> Result<[f64; 3]> {
        // getloadavg(3) through sysinfo
        let load = sysinfo::System::load_average();
        Ok([load.one, load.five, load.fifteen])
    }

    fn platform_name(&self) -> &'static str {
        "macos"
    }
}
