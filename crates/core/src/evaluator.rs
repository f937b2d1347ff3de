//! Pure classification of probe results and system samples.

use crate::{
    model::{HealthStatus, ProbeThresholds, ResourceThresholds, SystemHealth, SystemMetrics, SystemThresholds},
    probe::ProbeResult,
};
use std::collections::BTreeMap;

/// Classify one probe.
///
/// Maintenance overrides everything. A failed probe is critical. Latency is
/// compared against the critical threshold before the warning threshold.
pub fn evaluate_probe(result: &ProbeResult, thresholds: &ProbeThresholds, maintenance: bool) -> HealthStatus {
    if maintenance {
        return HealthStatus::Maintenance;
    }
    if !result.success {
        return HealthStatus::Critical;
    }

    let latency_ms = result.elapsed_seconds * 1000.0;
    if latency_ms > thresholds.critical_latency_ms as f64 {
        HealthStatus::Critical
    } else if latency_ms > thresholds.warning_latency_ms as f64 {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Classify one resource percentage; an absent reading is unknown.
pub fn evaluate_resource(value: Option<f32>, thresholds: &ResourceThresholds) -> HealthStatus {
    match value {
        None => HealthStatus::Unknown,
        Some(v) if v > thresholds.critical_percent => HealthStatus::Critical,
        Some(v) if v > thresholds.warning_percent => HealthStatus::Warning,
        Some(_) => HealthStatus::Healthy,
    }
}

/// Classify a system sample.
///
/// Each resource is judged on its own and the overall status is the worst of
/// them. Unknown resources never escalate; if every resource is unknown the
/// overall status is unknown too.
pub fn evaluate_system(sample: &SystemMetrics, thresholds: &SystemThresholds) -> SystemHealth {
    let mut resources = BTreeMap::new();
    resources.insert("cpu".to_string(), evaluate_resource(sample.cpu_percent, &thresholds.cpu));
    resources.insert(
        "memory".to_string(),
        evaluate_resource(sample.memory_percent, &thresholds.memory),
    );
    resources.insert("disk".to_string(), evaluate_resource(sample.disk_percent, &thresholds.disk));

    let status = HealthStatus::worst(resources.values().copied()).unwrap_or(HealthStatus::Unknown);

    SystemHealth {
        timestamp: sample.timestamp,
        status,
        resources,
        unavailable: sample.unavailable.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NetworkIo;
    use crate::probe::ProbeFailure;
    use chrono::Utc;

    fn ok(elapsed_seconds: f64) -> ProbeResult {
        ProbeResult::succeeded(200, elapsed_seconds)
    }

    fn sample(cpu: Option<f32>, memory: Option<f32>, disk: Option<f32>) -> SystemMetrics {
        SystemMetrics {
            timestamp: Utc::now(),
            cpu_percent: cpu,
            memory_percent: memory,
            disk_percent: disk,
            network_io: NetworkIo::default(),
            process_count: 100,
            load_average: None,
            unavailable: vec!["load_average".to_string()],
        }
    }

    #[test]
    fn fast_probe_is_healthy() {
        let thresholds = ProbeThresholds {
            warning_latency_ms: 200,
            critical_latency_ms: 1000,
        };
        assert_eq!(evaluate_probe(&ok(0.05), &thresholds, false), HealthStatus::Healthy);
    }

    #[test]
    fn latency_thresholds_check_critical_first() {
        let thresholds = ProbeThresholds::default();
        assert_eq!(evaluate_probe(&ok(0.15), &thresholds, false), HealthStatus::Healthy);
        assert_eq!(evaluate_probe(&ok(0.5), &thresholds, false), HealthStatus::Warning);
        assert_eq!(evaluate_probe(&ok(1.5), &thresholds, false), HealthStatus::Critical);
    }

    #[test]
    fn failed_probe_is_critical() {
        let timeout = ProbeResult::failed(ProbeFailure::Timeout, 30.0);
        assert_eq!(
            evaluate_probe(&timeout, &ProbeThresholds::default(), false),
            HealthStatus::Critical
        );

        let bad_status = ProbeResult::failed(ProbeFailure::Status(503), 0.01);
        assert_eq!(
            evaluate_probe(&bad_status, &ProbeThresholds::default(), false),
            HealthStatus::Critical
        );
    }

    #[test]
    fn maintenance_overrides_failure() {
        let refused = ProbeResult::failed(ProbeFailure::Connect("refused".into()), 0.001);
        assert_eq!(
            evaluate_probe(&refused, &ProbeThresholds::default(), true),
            HealthStatus::Maintenance
        );
    }

    #[test]
    fn system_status_is_worst_resource() {
        let health = evaluate_system(&sample(Some(95.0), Some(50.0), Some(10.0)), &SystemThresholds::default());
        assert_eq!(health.status, HealthStatus::Critical);
        assert_eq!(health.resources["cpu"], HealthStatus::Critical);
        assert_eq!(health.resources["memory"], HealthStatus::Healthy);
        assert_eq!(health.resources["disk"], HealthStatus::Healthy);
    }

    #[test]
    fn unknown_resource_does_not_escalate() {
        let health = evaluate_system(&sample(Some(75.0), None, Some(10.0)), &SystemThresholds::default());
        assert_eq!(health.status, HealthStatus::Warning);
        assert_eq!(health.resources["memory"], HealthStatus::Unknown);
        assert_eq!(health.unavailable, vec!["load_average".to_string()]);
    }

    #[test]
    fn all_unknown_is_unknown() {
        let health = evaluate_system(&sample(None, None, None), &SystemThresholds::default());
        assert_eq!(health.status, HealthStatus::Unknown);
    }

    #[test]
    fn thresholds_are_strict() {
        let thresholds = ResourceThresholds::new(70.0, 90.0);
        assert_eq!(evaluate_resource(Some(70.0), &thresholds), HealthStatus::Healthy);
        assert_eq!(evaluate_resource(Some(90.0), &thresholds), HealthStatus::Warning);
        assert_eq!(evaluate_resource(Some(90.1), &thresholds), HealthStatus::Critical);
    }
}
