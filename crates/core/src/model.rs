use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, time::Duration};

/// Health classification shared by components and the local system.
///
/// `Healthy < Warning < Critical` is the severity order used for
/// aggregation. `Unknown` and `Maintenance` sit outside that order and never
/// escalate an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Unknown,
    Maintenance,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl HealthStatus {
    /// Rank within the severity order, `None` for out-of-band statuses.
    pub fn severity(self) -> Option<u8> {
        match self {
            Self::Healthy => Some(0),
            Self::Warning => Some(1),
            Self::Critical => Some(2),
            Self::Unknown | Self::Maintenance => None,
        }
    }

    /// Highest-severity in-band status, or `None` if nothing contributes.
    pub fn worst<I>(statuses: I) -> Option<Self>
    where
        I: IntoIterator<Item = Self>,
    {
        statuses
            .into_iter()
            .filter_map(|status| status.severity().map(|rank| (rank, status)))
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, status)| status)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
            Self::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Descriptive tag value. Only strings, numbers and booleans are carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl MetadataValue {
    /// Converts a JSON scalar; arrays, objects and null are dropped.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Flag(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;
pub type ComponentMetrics = BTreeMap<String, f64>;

/// Latency thresholds applied to a component probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeThresholds {
    pub warning_latency_ms: u64,
    pub critical_latency_ms: u64,
}

impl Default for ProbeThresholds {
    fn default() -> Self {
        Self {
            warning_latency_ms: 200,
            critical_latency_ms: 1000,
        }
    }
}

/// Warning/critical percentages for one local resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceThresholds {
    pub warning_percent: f32,
    pub critical_percent: f32,
}

impl ResourceThresholds {
    pub const fn new(warning_percent: f32, critical_percent: f32) -> Self {
        Self {
            warning_percent,
            critical_percent,
        }
    }
}

/// Resource thresholds for the system loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemThresholds {
    pub cpu: ResourceThresholds,
    pub memory: ResourceThresholds,
    pub disk: ResourceThresholds,
}

impl Default for SystemThresholds {
    fn default() -> Self {
        Self {
            cpu: ResourceThresholds::new(70.0, 90.0),
            memory: ResourceThresholds::new(80.0, 95.0),
            disk: ResourceThresholds::new(85.0, 95.0),
        }
    }
}

/// A component registered for probing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredComponent {
    pub component_id: String,
    pub name: String,
    /// Probe URL
    pub target: String,
    /// Overrides the component loop interval for this component
    #[serde(default)]
    pub interval_ms: Option<u64>,
    /// Replaces the global probe thresholds entirely when set
    #[serde(default)]
    pub thresholds: Option<ProbeThresholds>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub maintenance: bool,
}

impl RegisteredComponent {
    pub fn new<I, N, T>(component_id: I, name: N, target: T) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            component_id: component_id.into(),
            name: name.into(),
            target: target.into(),
            interval_ms: None,
            thresholds: None,
            metadata: Metadata::new(),
            maintenance: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn with_thresholds(mut self, thresholds: ProbeThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_metadata<K: Into<String>, V: Into<MetadataValue>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}

/// Latest health snapshot of one registered component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component_id: String,
    pub name: String,
    pub status: HealthStatus,
    /// Completion time of the most recent probe, `None` until the first one
    pub last_check: Option<DateTime<Utc>>,
    /// Latency of the last probe in seconds
    pub response_time: f64,
    pub metadata: Metadata,
    pub metrics: ComponentMetrics,
}

impl ComponentHealth {
    /// Initial record for a freshly registered component.
    pub fn unknown(component: &RegisteredComponent) -> Self {
        let mut metadata = component.metadata.clone();
        metadata.insert("target".to_string(), component.target.clone().into());

        Self {
            component_id: component.component_id.clone(),
            name: component.name.clone(),
            status: HealthStatus::Unknown,
            last_check: None,
            response_time: 0.0,
            metadata,
            metrics: ComponentMetrics::new(),
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match self.last_check {
            Some(checked) => now
                .signed_duration_since(checked)
                .to_std()
                .map(|age| age > threshold)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Status as consumers should read it: stale records count as unknown.
    pub fn effective_status(&self, now: DateTime<Utc>, threshold: Duration) -> HealthStatus {
        if self.status == HealthStatus::Maintenance {
            return HealthStatus::Maintenance;
        }
        if self.is_stale(now, threshold) {
            HealthStatus::Unknown
        } else {
            self.status
        }
    }
}

/// Network traffic since the previous sample, summed over non-loopback interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

/// One local resource sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f32>,
    pub disk_percent: Option<f32>,
    pub network_io: NetworkIo,
    pub process_count: usize,
    /// 1, 5 and 15 minute averages
    pub load_average: Option<[f64; 3]>,
    /// Metrics that could not be read on this platform
    #[serde(default)]
    pub unavailable: Vec<String>,
}

/// Classified view of one system sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub timestamp: DateTime<Utc>,
    pub status: HealthStatus,
    pub resources: BTreeMap<String, HealthStatus>,
    pub unavailable: Vec<String>,
}

/// Collector service lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::Stopped
    }
}

/// Component record together with its read-time status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentView {
    #[serde(flatten)]
    pub health: ComponentHealth,
    pub effective_status: HealthStatus,
    pub stale: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
    pub unknown: usize,
    pub maintenance: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: HealthStatus) {
        match status {
            HealthStatus::Healthy => self.healthy += 1,
            HealthStatus::Warning => self.warning += 1,
            HealthStatus::Critical => self.critical += 1,
            HealthStatus::Unknown => self.unknown += 1,
            HealthStatus::Maintenance => self.maintenance += 1,
        }
    }
}

/// Everything a status endpoint or report needs in one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub generated_at: DateTime<Utc>,
    pub overall_status: HealthStatus,
    pub system: Option<SystemHealth>,
    pub latest_metrics: Option<SystemMetrics>,
    pub components: Vec<ComponentView>,
    pub status_counts: StatusCounts,
    pub registered_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_ignores_out_of_band_statuses() {
        let statuses = [
            HealthStatus::Unknown,
            HealthStatus::Warning,
            HealthStatus::Maintenance,
            HealthStatus::Healthy,
        ];
        assert_eq!(HealthStatus::worst(statuses), Some(HealthStatus::Warning));
        assert_eq!(
            HealthStatus::worst([HealthStatus::Unknown, HealthStatus::Maintenance]),
            None
        );
    }

    #[test]
    fn stale_record_reads_as_unknown_without_mutation() {
        let component = RegisteredComponent::new("svc-1", "Service", "http://x/health");
        let mut health = ComponentHealth::unknown(&component);
        health.status = HealthStatus::Healthy;
        let checked = Utc::now();
        health.last_check = Some(checked);

        let later = checked + chrono::Duration::seconds(10);
        assert!(health.is_stale(later, Duration::from_secs(5)));
        assert_eq!(
            health.effective_status(later, Duration::from_secs(5)),
            HealthStatus::Unknown
        );
        assert_eq!(
            health.effective_status(later, Duration::from_secs(60)),
            HealthStatus::Healthy
        );
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[test]
    fn maintenance_is_never_downgraded_by_staleness() {
        let component = RegisteredComponent::new("svc-1", "Service", "http://x/health");
        let mut health = ComponentHealth::unknown(&component);
        health.status = HealthStatus::Maintenance;
        health.last_check = Some(Utc::now() - chrono::Duration::hours(1));
        assert_eq!(
            health.effective_status(Utc::now(), Duration::from_secs(1)),
            HealthStatus::Maintenance
        );
    }

    #[test]
    fn unknown_record_carries_target_and_static_metadata() {
        let component = RegisteredComponent::new("db", "Database", "http://db/health")
            .with_metadata("tier", "storage");
        let health = ComponentHealth::unknown(&component);
        assert_eq!(health.status, HealthStatus::Unknown);
        assert!(health.last_check.is_none());
        assert_eq!(health.metadata.get("tier"), Some(&MetadataValue::from("storage")));
        assert_eq!(
            health.metadata.get("target").and_then(MetadataValue::as_text),
            Some("http://db/health")
        );
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&HealthStatus::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        assert_eq!(HealthStatus::Critical.to_string(), "CRITICAL");
    }
}
