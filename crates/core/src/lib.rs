pub mod config;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod model;
pub mod platform;
pub mod probe;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::{CliConfig, Config};
pub use error::{CoreError, Result};
pub use metrics::SystemSampler;
pub use model::*;
pub use platform::PlatformProvider;
pub use probe::{ProbeClient, ProbeFailure, ProbeResult};
pub use service::CollectorService;
pub use store::HealthStore;
