use crate::{
    error::{CoreError, Result},
    model::{ProbeThresholds, RegisteredComponent, ResourceThresholds, SystemThresholds},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

/// Shortest interval any loop may run at
const MIN_INTERVAL_MS: u64 = 10;

/// Collector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// System sampling interval in milliseconds
    pub system_interval_ms: u64,

    /// Component probing interval in milliseconds
    pub component_interval_ms: u64,

    /// Hard timeout for a single probe in milliseconds
    pub probe_timeout_ms: u64,

    /// Maximum probes in flight at once
    pub max_in_flight: usize,

    /// Age after which a component record reads as unknown
    pub staleness_ms: u64,

    /// How long stop() lets in-flight probes finish before cancelling them
    pub shutdown_grace_ms: u64,

    /// Number of system samples kept in memory
    pub metrics_capacity: usize,

    pub system_thresholds: SystemThresholds,

    /// Default latency thresholds for components without their own
    pub probe_thresholds: ProbeThresholds,

    /// Components registered at startup
    pub components: Vec<RegisteredComponent>,

    /// Report cadence of the command-line front end
    pub report_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            system_interval_ms: 15_000,
            component_interval_ms: 30_000,
            probe_timeout_ms: 30_000,
            max_in_flight: 16,
            staleness_ms: 120_000,
            shutdown_grace_ms: 5_000,
            metrics_capacity: 60,
            system_thresholds: SystemThresholds::default(),
            probe_thresholds: ProbeThresholds::default(),
            components: Vec::new(),
            report_interval_ms: 5_000,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in order of preference:
    /// 1. CLI arguments override everything
    /// 2. JSON config file if specified
    /// 3. Default config file locations
    /// 4. Built-in defaults
    pub fn load(cli_config: Option<&CliConfig>, json_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = match json_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load_default_config()?.unwrap_or_default(),
        };

        // Override with CLI arguments
        if let Some(cli) = cli_config {
            config.apply_cli_overrides(cli);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific JSON file. Missing fields take
    /// their defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| CoreError::config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| CoreError::config(format!("Failed to parse config file {}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    fn load_default_config() -> Result<Option<Self>> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(config) => return Ok(Some(config)),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable config file");
                        continue;
                    }
                }
            }
        }

        Ok(None)
    }

    /// Get default configuration file search paths
    pub fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("healthmon").join("config.json"));
        }

        // Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".healthmon.json"));
        }

        // Current directory
        paths.push(PathBuf::from("healthmon.json"));

        paths
    }

    /// Apply CLI argument overrides
    fn apply_cli_overrides(&mut self, cli: &CliConfig) {
        if let Some(ms) = cli.system_interval_ms {
            self.system_interval_ms = ms;
        }
        if let Some(ms) = cli.component_interval_ms {
            self.component_interval_ms = ms;
        }
        if let Some(ms) = cli.probe_timeout_ms {
            self.probe_timeout_ms = ms;
        }
        if let Some(n) = cli.max_in_flight {
            self.max_in_flight = n;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("system_interval_ms", self.system_interval_ms),
            ("component_interval_ms", self.component_interval_ms),
            ("report_interval_ms", self.report_interval_ms),
        ] {
            if value < MIN_INTERVAL_MS {
                return Err(CoreError::config(format!(
                    "{} must be at least {}ms",
                    name, MIN_INTERVAL_MS
                )));
            }
        }

        if self.probe_timeout_ms == 0 {
            return Err(CoreError::config("probe_timeout_ms must be greater than zero"));
        }
        if self.shutdown_grace_ms == 0 {
            return Err(CoreError::config("shutdown_grace_ms must be greater than zero"));
        }
        if self.max_in_flight == 0 {
            return Err(CoreError::config("max_in_flight must be at least 1"));
        }
        if self.metrics_capacity == 0 {
            return Err(CoreError::config("metrics_capacity must be at least 1"));
        }

        validate_resource("cpu", &self.system_thresholds.cpu)?;
        validate_resource("memory", &self.system_thresholds.memory)?;
        validate_resource("disk", &self.system_thresholds.disk)?;
        validate_latency("probe_thresholds", &self.probe_thresholds)?;

        let mut seen = HashSet::new();
        for component in &self.components {
            if component.component_id.is_empty() {
                return Err(CoreError::config("component_id must not be empty"));
            }
            if !seen.insert(component.component_id.as_str()) {
                return Err(CoreError::config(format!(
                    "Duplicate component id {}",
                    component.component_id
                )));
            }
            if let Some(ms) = component.interval_ms {
                if ms < MIN_INTERVAL_MS {
                    return Err(CoreError::config(format!(
                        "Interval for {} must be at least {}ms",
                        component.component_id, MIN_INTERVAL_MS
                    )));
                }
            }
            if let Some(thresholds) = &component.thresholds {
                validate_latency(&component.component_id, thresholds)?;
            }
        }

        Ok(())
    }

    pub fn system_interval(&self) -> Duration {
        Duration::from_millis(self.system_interval_ms)
    }

    pub fn component_interval(&self) -> Duration {
        Duration::from_millis(self.component_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_millis(self.staleness_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

fn validate_resource(name: &str, thresholds: &ResourceThresholds) -> Result<()> {
    let in_range = |v: f32| (0.0..=100.0).contains(&v);
    if !in_range(thresholds.warning_percent) || !in_range(thresholds.critical_percent) {
        return Err(CoreError::config(format!(
            "{} thresholds must be between 0 and 100",
            name
        )));
    }
    if thresholds.warning_percent > thresholds.critical_percent {
        return Err(CoreError::config(format!(
            "{} warning threshold exceeds critical threshold",
            name
        )));
    }
    Ok(())
}

fn validate_latency(name: &str, thresholds: &ProbeThresholds) -> Result<()> {
    if thresholds.warning_latency_ms > thresholds.critical_latency_ms {
        return Err(CoreError::config(format!(
            "{}: warning latency exceeds critical latency",
            name
        )));
    }
    Ok(())
}

/// CLI configuration (temporary struct for CLI parsing)
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub system_interval_ms: Option<u64>,
    pub component_interval_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub max_in_flight: Option<usize>,
}
