use super::PlatformProvider;
use crate::error::Result;

pub struct LinuxProvider;

impl LinuxProvider {
    pub fn new() -> Self {
        Self
    }
}

impl PlatformProvider for LinuxProvider {
    fn load_average(&self) -> Result<[f64; 3]> {
        #[cfg(feature = "linux_procfs")]
        {
            self.load_average_procfs()
        }

        #[cfg(not(feature = "linux_procfs"))]
        {
            let load = sysinfo::System::load_average();
            Ok([load.one, load.five, load.fifteen])
        }
    }

    fn platform_name(&self) -> &'static str {
        "linux"
    }
}

#[cfg(feature = "linux_procfs")]
impl LinuxProvider {
    fn load_average_procfs(&self) -> Result<[f64; 3]> {
        use procfs::Current;

        // /proc/loadavg
        let load = procfs::LoadAverage::current()?;
        Ok([load.one as f64, load.five as f64, load.fifteen as f64])
    }
}
