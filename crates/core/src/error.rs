use thiserror::Error;

/// Core errors for the health collector
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Component already registered: {0}")]
    DuplicateComponent(String),

    #[error("Component not found: {0}")]
    NotFound(String),

    #[error("Collector is already running")]
    AlreadyRunning,

    #[error("Collector is not running")]
    NotRunning,

    #[error("Failed to allocate outbound client: {0}")]
    ClientInit(String),

    #[error("Metric unavailable on this platform: {0}")]
    SamplingUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("System information error: {0}")]
    SystemInfo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "linux_procfs")]
    #[error("Procfs error: {0}")]
    Procfs(#[from] procfs::ProcError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn duplicate_component<S: Into<String>>(id: S) -> Self {
        Self::DuplicateComponent(id.into())
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound(id.into())
    }

    pub fn client_init<S: Into<String>>(msg: S) -> Self {
        Self::ClientInit(msg.into())
    }

    pub fn sampling_unavailable<S: Into<String>>(metric: S) -> Self {
        Self::SamplingUnavailable(metric.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn system_info<S: Into<String>>(msg: S) -> Self {
        Self::SystemInfo(msg.into())
    }
}
