//! Metrics: per-request samples in, k6-style named aggregates out.
//!
//! - [`RequestSample`]: one outcome per iteration, consumed by the collector
//! - [`MetricsCollector`]: thread-safe accumulator shared by every worker
//! - [`MetricsAggregate`]: the final snapshot, `name -> {kind, stat -> value}`
//! - [`ThresholdSet`]: pass/fail expressions evaluated against the snapshot

mod collector;
mod threshold;

pub use collector::MetricsCollector;
pub use threshold::{
    Comparison, Threshold, ThresholdResult, ThresholdSet, GLOBAL_SAFETY_THRESHOLD,
};

use crate::transport::TransportErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Status check pass rate
pub const CHECKS: &str = "checks";
/// Failed request rate
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
/// Request latency trend
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
/// Requests sent
pub const HTTP_REQS: &str = "http_reqs";
/// Completed iterations
pub const ITERATIONS: &str = "iterations";
/// Response bytes
pub const DATA_RECEIVED: &str = "data_received";
/// Request bytes
pub const DATA_SENT: &str = "data_sent";
/// Live virtual users
pub const VUS: &str = "vus";
/// Planned maximum virtual users
pub const VUS_MAX: &str = "vus_max";

/// Every metric name the collector produces, in report order
pub const METRIC_NAMES: [&str; 9] = [
    CHECKS,
    DATA_RECEIVED,
    DATA_SENT,
    HTTP_REQ_DURATION,
    HTTP_REQ_FAILED,
    HTTP_REQS,
    ITERATIONS,
    VUS,
    VUS_MAX,
];

/// Metric kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic count with a per-second rate
    Counter,
    /// Fraction of non-zero observations
    Rate,
    /// Distribution of observed values
    Trend,
    /// Last observed value with its range
    Gauge,
}

impl MetricKind {
    /// Lowercase kind name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Rate => "rate",
            Self::Trend => "trend",
            Self::Gauge => "gauge",
        }
    }

    /// Stat keys every metric of this kind reports.
    /// Trends additionally answer any `p(N)` asked for by a threshold.
    #[must_use]
    pub const fn stats(self) -> &'static [&'static str] {
        match self {
            Self::Counter => &["count", "rate"],
            Self::Rate => &["rate", "passes", "fails"],
            Self::Trend => &["avg", "min", "med", "max", "p(90)", "p(95)", "p(99)"],
            Self::Gauge => &["value", "min", "max"],
        }
    }
}

/// Kind of a built-in metric
#[must_use]
pub fn metric_kind(name: &str) -> Option<MetricKind> {
    match name {
        CHECKS | HTTP_REQ_FAILED => Some(MetricKind::Rate),
        HTTP_REQ_DURATION => Some(MetricKind::Trend),
        HTTP_REQS | ITERATIONS | DATA_RECEIVED | DATA_SENT => Some(MetricKind::Counter),
        VUS | VUS_MAX => Some(MetricKind::Gauge),
        _ => None,
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aggregated metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Kind
    #[serde(rename = "type")]
    pub kind: MetricKind,
    /// Stat key -> value, e.g. `p(95) -> 120.5`
    pub values: BTreeMap<String, f64>,
}

impl Metric {
    /// Look up a stat
    #[must_use]
    pub fn value(&self, stat: &str) -> Option<f64> {
        self.values.get(stat).copied()
    }
}

/// Final aggregated metrics, keyed by metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsAggregate {
    /// Metrics by name
    pub metrics: BTreeMap<String, Metric>,
    /// Wall time covered by the snapshot, in seconds
    pub duration_secs: f64,
}

impl MetricsAggregate {
    /// Look up a metric
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Look up a single stat of a metric
    #[must_use]
    pub fn value(&self, name: &str, stat: &str) -> Option<f64> {
        self.get(name).and_then(|m| m.value(stat))
    }
}

/// Outcome of one iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSample {
    /// Unix millis when the request completed
    pub timestamp_ms: i64,
    /// Response status; 0 when there was no response
    pub status: u16,
    /// Time from send to full response
    pub latency: Duration,
    /// Status matched the expected status
    pub success: bool,
    /// Set when the transport failed
    pub error_kind: Option<TransportErrorKind>,
    /// Response body bytes
    pub bytes_received: u64,
    /// Request body bytes
    pub bytes_sent: u64,
}

impl RequestSample {
    /// k6's default expected-status rule: a request fails when it produced
    /// no response or the status is outside 200-399.
    #[must_use]
    pub fn is_failed_request(&self) -> bool {
        self.error_kind.is_some() || !(200..400).contains(&self.status)
    }
}

/// Format a number the way JavaScript prints it: integers without a
/// fractional part, everything else in shortest round-trip form.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}
