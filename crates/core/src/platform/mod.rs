pub mod linux;
pub mod macos;
pub mod windows;

use crate::error::Result;

/// Platform-specific counters the portable sampler cannot always read
pub trait PlatformProvider: Send + Sync {
    /// 1, 5 and 15 minute load averages.
    ///
    /// Returns `CoreError::SamplingUnavailable` where the platform has no
    /// load average concept.
    fn load_average(&self) -> Result<[f64; 3]>;

    /// Get platform name
    fn platform_name(&self) -> &'static str;
}

/// Get the appropriate platform provider for the current system
pub fn get_platform_provider() -> Box<dyn PlatformProvider> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxProvider::new())
    }

    #[cfg(target_os = "macos")]
    {
        Box::new(macos::MacosProvider::new())
    }

    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsProvider::new())
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Box::new(GenericProvider::new())
    }
}

/// Generic provider for unsupported platforms
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub struct GenericProvider;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl GenericProvider {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl PlatformProvider for GenericProvider {
    fn load_average(&self) -> Result<[f64; 3]> {
        Err(crate::error::CoreError::sampling_unavailable("load_average"))
    }

    fn platform_name(&self) -> &'static str {
        "generic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_matches_target_os() {
        let provider = get_platform_provider();
        if cfg!(target_os = "linux") {
            assert_eq!(provider.platform_name(), "linux");
        } else if cfg!(target_os = "macos") {
            assert_eq!(provider.platform_name(), "macos");
        } else if cfg!(target_os = "windows") {
            assert_eq!(provider.platform_name(), "windows");
        }
    }

    #[cfg(unix)]
    #[test]
    fn unix_load_average_is_non_negative() {
        let load = get_platform_provider().load_average().unwrap();
        assert!(load.iter().all(|value| *value >= 0.0));
    }

    #[cfg(windows)]
    #[test]
    fn windows_load_average_is_unavailable() {
        let err = get_platform_provider().load_average().unwrap_err();
        assert!(matches!(err, crate::error::CoreError::SamplingUnavailable(_)));
    }
}
