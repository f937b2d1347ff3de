//! Outbound liveness/latency checks.
//!
//! [`ProbeClient::probe`] never returns an error: every way a check can go
//! wrong is folded into a [`ProbeResult`] with `success == false` and a
//! categorized [`ProbeFailure`].

use crate::{
    error::{CoreError, Result},
    model::{ComponentMetrics, Metadata, MetadataValue},
};
use serde::{Deserialize, Serialize};
use std::{
    error::Error as StdError,
    time::{Duration, Instant},
};

/// Bodies larger than this are not inspected for reported metrics
const MAX_REPORT_BYTES: usize = 64 * 1024;

/// Why a probe did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeFailure {
    /// No response within the hard timeout
    Timeout,
    /// Connection refused, DNS failure, unreachable host
    Connect(String),
    /// The component answered with a non-2xx status
    Status(u16),
    /// Malformed target or a protocol error mid-exchange
    Request(String),
    /// The collector stopped before the probe finished
    Cancelled,
}

impl ProbeFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect(_) => "connect",
            Self::Status(_) => "status",
            Self::Request(_) => "request",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Timeout => "probe timed out".to_string(),
            Self::Connect(detail) => format!("connection failed: {}", detail),
            Self::Status(code) => format!("unexpected HTTP status {}", code),
            Self::Request(detail) => format!("request failed: {}", detail),
            Self::Cancelled => "probe cancelled at shutdown".to_string(),
        }
    }
}

/// Data a component reported about itself in its health response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub metadata: Metadata,
    pub metrics: ComponentMetrics,
}

impl ProbeReport {
    /// Pull `metrics`, `metadata`, `version` and `status` out of a JSON body.
    /// Anything that is not a JSON object yields an empty report.
    pub fn from_body(body: &[u8]) -> Self {
        let mut report = Self::default();
        if body.len() > MAX_REPORT_BYTES {
            return report;
        }

        let Ok(serde_json::Value::Object(root)) = serde_json::from_slice::<serde_json::Value>(body) else {
            return report;
        };

        if let Some(serde_json::Value::Object(metrics)) = root.get("metrics") {
            for (key, value) in metrics {
                if let Some(number) = value.as_f64() {
                    report.metrics.insert(key.clone(), number);
                }
            }
        }

        if let Some(serde_json::Value::Object(metadata)) = root.get("metadata") {
            for (key, value) in metadata {
                if let Some(value) = MetadataValue::from_json(value) {
                    report.metadata.insert(key.clone(), value);
                }
            }
        }

        if let Some(version) = root.get("version").and_then(MetadataValue::from_json) {
            report.metadata.insert("version".to_string(), version);
        }
        if let Some(status) = root.get("status").and_then(MetadataValue::from_json) {
            report.metadata.insert("reported_status".to_string(), status);
        }

        report
    }
}

/// Outcome of a single probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub success: bool,
    /// HTTP status when the component answered at all
    pub status_code: Option<u16>,
    pub failure: Option<ProbeFailure>,
    pub elapsed_seconds: f64,
    pub report: ProbeReport,
}

impl ProbeResult {
    pub fn succeeded(status_code: u16, elapsed_seconds: f64) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            failure: None,
            elapsed_seconds,
            report: ProbeReport::default(),
        }
    }

    pub fn failed(failure: ProbeFailure, elapsed_seconds: f64) -> Self {
        let status_code = match failure {
            ProbeFailure::Status(code) => Some(code),
            _ => None,
        };

        Self {
            success: false,
            status_code,
            failure: Some(failure),
            elapsed_seconds,
            report: ProbeReport::default(),
        }
    }

    pub fn with_report(mut self, report: ProbeReport) -> Self {
        self.report = report;
        self
    }
}

/// Shared HTTP client for probing registered components.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    client: reqwest::Client,
}

impl ProbeClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("healthmon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::client_init(error_chain(&e)))?;

        Ok(Self { client })
    }

    /// Issue one GET against `target`, bounded by `timeout`.
    pub async fn probe(&self, target: &str, timeout: Duration) -> ProbeResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, self.fetch(target, timeout)).await;
        let elapsed_seconds = started.elapsed().as_secs_f64();

        match outcome {
            Err(_) => ProbeResult::failed(ProbeFailure::Timeout, elapsed_seconds),
            Ok(Err(e)) => ProbeResult::failed(classify(&e), elapsed_seconds),
            Ok(Ok((status, body))) if status.is_success() => {
                ProbeResult::succeeded(status.as_u16(), elapsed_seconds).with_report(ProbeReport::from_body(&body))
            }
            Ok(Ok((status, _))) => ProbeResult::failed(ProbeFailure::Status(status.as_u16()), elapsed_seconds),
        }
    }

    async fn fetch(&self, target: &str, timeout: Duration) -> reqwest::Result<(reqwest::StatusCode, Vec<u8>)> {
        let mut response = self.client.get(target).timeout(timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Ok((status, Vec::new()));
        }
        if response.content_length().is_some_and(|len| len > MAX_REPORT_BYTES as u64) {
            return Ok((status, Vec::new()));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > MAX_REPORT_BYTES {
                // Oversized reports are ignored; stop reading here
                return Ok((status, Vec::new()));
            }
            body.extend_from_slice(&chunk);
        }
        Ok((status, body))
    }
}

fn classify(error: &reqwest::Error) -> ProbeFailure {
    if error.is_timeout() {
        ProbeFailure::Timeout
    } else if error.is_connect() {
        ProbeFailure::Connect(error_chain(error))
    } else if let Some(status) = error.status() {
        ProbeFailure::Status(status.as_u16())
    } else {
        ProbeFailure::Request(error_chain(error))
    }
}

/// Flatten an error and its sources; reqwest hides DNS and socket detail in
/// the source chain.
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
