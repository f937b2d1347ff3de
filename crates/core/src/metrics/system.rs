use crate::platform::PlatformProvider;
use tracing::debug;

pub struct LoadCollector {
    platform: Box<dyn PlatformProvider>,
}

impl LoadCollector {
    pub fn new(platform: Box<dyn PlatformProvider>) -> Self {
        Self { platform }
    }

    pub fn collect(&mut self) -> Option<[f64; 3]> {
        match self.platform.load_average() {
            Ok(load) => Some(load),
            Err(e) => {
                debug!(platform = self.platform.platform_name(), error = %e, "Load average unavailable");
                None
            }
        }
    }
}
