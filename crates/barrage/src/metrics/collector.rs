//! Shared sample accumulator.

use super::{
    Metric, MetricKind, MetricsAggregate, RequestSample, CHECKS, DATA_RECEIVED, DATA_SENT,
    HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS, VUS, VUS_MAX,
};
use super::format_number;
use crate::result::{BarrageError, BarrageResult};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Highest latency the histogram tracks exactly (one hour, in microseconds)
const MAX_TRACKED_MICROS: u64 = 3_600_000_000;

/// Trend percentiles reported next to avg/min/med/max
const PERCENTILES: [(&str, f64); 3] = [("p(90)", 0.90), ("p(95)", 0.95), ("p(99)", 0.99)];

/// Thread-safe accumulator shared by all workers.
///
/// Counters are plain atomics. Latency is kept as integer microseconds in an
/// HDR histogram plus exact sum/min/max, so the final aggregate does not
/// depend on the order samples arrive in.
#[derive(Debug)]
pub struct MetricsCollector {
    requests: AtomicU64,
    checks_passed: AtomicU64,
    failed_requests: AtomicU64,
    iterations: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    latency_sum_us: AtomicU64,
    latency_min_us: AtomicU64,
    latency_max_us: AtomicU64,
    latency: Mutex<Histogram<u64>>,
    vus: AtomicU64,
    vus_min: AtomicU64,
    vus_peak: AtomicU64,
    vus_max: AtomicU64,
}

impl MetricsCollector {
    /// Create an empty collector
    pub fn new() -> BarrageResult<Self> {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKED_MICROS, 3).map_err(|e| {
            BarrageError::invalid_state(format!("failed to initialize latency histogram: {e}"))
        })?;
        Ok(Self {
            requests: AtomicU64::new(0),
            checks_passed: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_min_us: AtomicU64::new(u64::MAX),
            latency_max_us: AtomicU64::new(0),
            latency: Mutex::new(histogram),
            vus: AtomicU64::new(0),
            vus_min: AtomicU64::new(u64::MAX),
            vus_peak: AtomicU64::new(0),
            vus_max: AtomicU64::new(0),
        })
    }

    /// Ingest one sample
    pub fn record(&self, sample: &RequestSample) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.iterations.fetch_add(1, Ordering::Relaxed);
        if sample.success {
            self.checks_passed.fetch_add(1, Ordering::Relaxed);
        }
        if sample.is_failed_request() {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_received
            .fetch_add(sample.bytes_received, Ordering::Relaxed);
        self.bytes_sent.fetch_add(sample.bytes_sent, Ordering::Relaxed);

        let micros = u64::try_from(sample.latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_sum_us.fetch_add(micros, Ordering::Relaxed);
        self.latency_min_us.fetch_min(micros, Ordering::Relaxed);
        self.latency_max_us.fetch_max(micros, Ordering::Relaxed);
        self.latency.lock().saturating_record(micros);
    }

    /// Update the live virtual user gauge
    pub fn set_vus(&self, vus: u32) {
        let vus = u64::from(vus);
        self.vus.store(vus, Ordering::Relaxed);
        self.vus_min.fetch_min(vus, Ordering::Relaxed);
        self.vus_peak.fetch_max(vus, Ordering::Relaxed);
    }

    /// Record the planned maximum number of virtual users
    pub fn set_vus_max(&self, vus: u32) {
        self.vus_max.store(u64::from(vus), Ordering::Relaxed);
    }

    /// Number of samples recorded so far
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Aggregate everything recorded so far. `elapsed` is the wall time the
    /// per-second rates are computed over.
    #[must_use]
    pub fn snapshot(&self, elapsed: Duration) -> MetricsAggregate {
        self.snapshot_with_percentiles(elapsed, &[])
    }

    /// Like [`snapshot`](Self::snapshot), with extra latency percentiles
    /// (0-100) reported as `p(N)` next to the fixed ones
    #[must_use]
    pub fn snapshot_with_percentiles(&self, elapsed: Duration, extra: &[f64]) -> MetricsAggregate {
        let secs = elapsed.as_secs_f64();
        let requests = self.requests.load(Ordering::Relaxed);
        let mut metrics = BTreeMap::new();

        let passed = self.checks_passed.load(Ordering::Relaxed);
        metrics.insert(CHECKS.to_string(), rate_metric(passed, requests));
        let failed = self.failed_requests.load(Ordering::Relaxed);
        metrics.insert(HTTP_REQ_FAILED.to_string(), rate_metric(failed, requests));

        metrics.insert(HTTP_REQ_DURATION.to_string(), self.latency_trend(requests, extra));

        metrics.insert(HTTP_REQS.to_string(), counter_metric(requests, secs));
        let iterations = self.iterations.load(Ordering::Relaxed);
        metrics.insert(ITERATIONS.to_string(), counter_metric(iterations, secs));
        let received = self.bytes_received.load(Ordering::Relaxed);
        metrics.insert(DATA_RECEIVED.to_string(), counter_metric(received, secs));
        let sent = self.bytes_sent.load(Ordering::Relaxed);
        metrics.insert(DATA_SENT.to_string(), counter_metric(sent, secs));

        let vus = self.vus.load(Ordering::Relaxed);
        let vus_min = self.vus_min.load(Ordering::Relaxed);
        let vus_peak = self.vus_peak.load(Ordering::Relaxed);
        let vus_min = if vus_min == u64::MAX { 0 } else { vus_min };
        metrics.insert(VUS.to_string(), gauge_metric(vus, vus_min, vus_peak));
        let vus_max = self.vus_max.load(Ordering::Relaxed);
        metrics.insert(VUS_MAX.to_string(), gauge_metric(vus_max, vus_max, vus_max));

        MetricsAggregate {
            metrics,
            duration_secs: secs,
        }
    }

    fn latency_trend(&self, requests: u64, extra: &[f64]) -> Metric {
        let mut values = BTreeMap::new();
        let extra_keys = extra.iter().map(|&pct| (percentile_key(pct), pct / 100.0));
        if requests == 0 {
            for key in ["avg", "min", "med", "max"] {
                values.insert(key.to_string(), 0.0);
            }
            for (key, _) in PERCENTILES {
                values.insert(key.to_string(), 0.0);
            }
            for (key, _) in extra_keys {
                values.insert(key, 0.0);
            }
            return metric(MetricKind::Trend, values);
        }

        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let min = self.latency_min_us.load(Ordering::Relaxed);
        let max = self.latency_max_us.load(Ordering::Relaxed);
        let histogram = self.latency.lock();
        // Bucket midpoints, clamped to the exact extremes.
        let quantile = |q: f64| {
            let bucketed = histogram.median_equivalent(histogram.value_at_quantile(q));
            micros_to_ms(bucketed.clamp(min, max))
        };

        values.insert("avg".to_string(), sum as f64 / requests as f64 / 1000.0);
        values.insert("min".to_string(), micros_to_ms(min));
        values.insert("med".to_string(), quantile(0.5));
        values.insert("max".to_string(), micros_to_ms(max));
        for (key, q) in PERCENTILES {
            values.insert(key.to_string(), quantile(q));
        }
        for (key, q) in extra_keys {
            values.insert(key, quantile(q.clamp(0.0, 1.0)));
        }
        metric(MetricKind::Trend, values)
    }
}

fn percentile_key(pct: f64) -> String {
    format!("p({})", format_number(pct))
}

fn micros_to_ms(micros: u64) -> f64 {
    micros as f64 / 1000.0
}

fn metric(kind: MetricKind, values: BTreeMap<String, f64>) -> Metric {
    Metric { kind, values }
}

/// k6 rate semantics: `passes` counts non-zero observations
fn rate_metric(passes: u64, total: u64) -> Metric {
    let rate = if total == 0 {
        0.0
    } else {
        passes as f64 / total as f64
    };
    let mut values = BTreeMap::new();
    values.insert("rate".to_string(), rate);
    values.insert("passes".to_string(), passes as f64);
    values.insert("fails".to_string(), (total - passes) as f64);
    metric(MetricKind::Rate, values)
}

fn counter_metric(count: u64, secs: f64) -> Metric {
    let rate = if secs > 0.0 { count as f64 / secs } else { 0.0 };
    let mut values = BTreeMap::new();
    values.insert("count".to_string(), count as f64);
    values.insert("rate".to_string(), rate);
    metric(MetricKind::Counter, values)
}

fn gauge_metric(value: u64, min: u64, max: u64) -> Metric {
    let mut values = BTreeMap::new();
    values.insert("value".to_string(), value as f64);
    values.insert("min".to_string(), min as f64);
    values.insert("max".to_string(), max as f64);
    metric(MetricKind::Gauge, values)
}
