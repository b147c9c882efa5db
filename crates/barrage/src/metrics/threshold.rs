//! Threshold expressions.
//!
//! An expression is `<stat> <op> <number>`, e.g. `p(95)<500` or
//! `rate<0.01`. Thresholds are parsed up front so a typo fails the run
//! before any traffic is generated.

use super::{format_number, metric_kind, MetricKind, MetricsAggregate, HTTP_REQ_FAILED};
use crate::result::{BarrageError, BarrageResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Always-on threshold: fewer than 1% of requests may fail
pub const GLOBAL_SAFETY_THRESHOLD: (&str, &str) = (HTTP_REQ_FAILED, "rate<0.01");

const EXPRESSION_PATTERN: &str =
    r"^\s*([A-Za-z_]+(?:\(\s*\d+(?:\.\d+)?\s*\))?)\s*(<=|>=|==|!=|<|>)\s*(-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?)\s*$";

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            _ => None,
        }
    }

    /// Apply the comparison
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn holds(self, actual: f64, bound: f64) -> bool {
        match self {
            Self::Lt => actual < bound,
            Self::Le => actual <= bound,
            Self::Gt => actual > bound,
            Self::Ge => actual >= bound,
            Self::Eq => actual == bound,
            Self::Ne => actual != bound,
        }
    }

    /// Operator symbol
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A parsed threshold on one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    /// Metric name
    pub metric: String,
    /// Expression as written
    pub expression: String,
    /// Stat key, e.g. `p(95)`
    pub stat: String,
    /// Operator
    pub op: Comparison,
    /// Right-hand side
    pub bound: f64,
}

impl Threshold {
    /// Parse an expression for a metric
    pub fn parse(metric: &str, expression: &str) -> BarrageResult<Self> {
        let kind = metric_kind(metric).ok_or_else(|| {
            BarrageError::config(format!("threshold on unknown metric '{metric}'"))
        })?;
        let pattern = Regex::new(EXPRESSION_PATTERN)
            .map_err(|e| BarrageError::invalid_state(format!("threshold pattern: {e}")))?;
        let malformed = || {
            BarrageError::config(format!(
                "malformed threshold '{expression}' on {metric} (expected e.g. 'p(95)<500')"
            ))
        };
        let captures = pattern.captures(expression).ok_or_else(malformed)?;
        let stat: String = captures[1].chars().filter(|c| !c.is_whitespace()).collect();
        let stat = canonical_stat(metric, kind, &stat)?;
        let op = Comparison::parse(&captures[2]).ok_or_else(malformed)?;
        let bound: f64 = captures[3].parse().map_err(|_| malformed())?;

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.trim().to_string(),
            stat,
            op,
            bound,
        })
    }

    /// Percentile this threshold reads, e.g. `99.9` for `p(99.9)`
    #[must_use]
    pub fn percentile(&self) -> Option<f64> {
        parse_percentile(&self.stat)
    }

    /// Evaluate against a final aggregate. A stat the aggregate lacks fails.
    #[must_use]
    pub fn evaluate(&self, aggregate: &MetricsAggregate) -> ThresholdResult {
        let actual = aggregate.value(&self.metric, &self.stat);
        ThresholdResult {
            metric: self.metric.clone(),
            expression: self.expression.clone(),
            passed: actual.is_some_and(|v| self.op.holds(v, self.bound)),
            actual,
        }
    }
}

fn parse_percentile(stat: &str) -> Option<f64> {
    stat.strip_prefix("p(")?.strip_suffix(')')?.parse().ok()
}

/// Stat key as the aggregate spells it: `p(50)` is `med`, `p(95.0)` is `p(95)`.
fn canonical_stat(metric: &str, kind: MetricKind, stat: &str) -> BarrageResult<String> {
    if kind.stats().contains(&stat) {
        return Ok(stat.to_string());
    }
    if kind == MetricKind::Trend {
        if let Some(pct) = parse_percentile(stat).filter(|p| (0.0..=100.0).contains(p)) {
            let key = if (pct - 50.0).abs() < f64::EPSILON {
                "med".to_string()
            } else {
                format!("p({})", format_number(pct))
            };
            return Ok(key);
        }
    }
    Err(BarrageError::config(format!(
        "{metric} is a {kind} metric and has no stat '{stat}' (expected one of {})",
        kind.stats().join(", ")
    )))
}

/// Outcome of one threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    /// Metric name
    pub metric: String,
    /// Expression as written
    pub expression: String,
    /// Whether the expression held
    pub passed: bool,
    /// Observed value of the stat, if the metric had it
    pub actual: Option<f64>,
}

/// Every threshold of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    /// Parse caller thresholds without the global safety threshold
    pub fn parse(custom: &BTreeMap<String, Vec<String>>) -> BarrageResult<Self> {
        let thresholds = custom
            .iter()
            .flat_map(|(metric, exprs)| exprs.iter().map(move |e| Threshold::parse(metric, e)))
            .collect::<BarrageResult<Vec<_>>>()?;
        Ok(Self { thresholds })
    }

    /// Parse caller thresholds and merge in the global safety threshold.
    /// Caller entries on the same metric are kept alongside it.
    pub fn with_defaults(custom: &BTreeMap<String, Vec<String>>) -> BarrageResult<Self> {
        let mut set = Self::parse(custom)?;
        let (metric, expression) = GLOBAL_SAFETY_THRESHOLD;
        let global = Threshold::parse(metric, expression)?;
        let already = set.thresholds.iter().any(|t| {
            t.metric == global.metric
                && t.stat == global.stat
                && t.op == global.op
                && (t.bound - global.bound).abs() < f64::EPSILON
        });
        if !already {
            set.thresholds.push(global);
        }
        Ok(set)
    }

    /// Parsed thresholds in evaluation order
    #[must_use]
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Trend percentiles the thresholds read beyond the reported ones
    #[must_use]
    pub fn extra_percentiles(&self) -> Vec<f64> {
        let mut extra: Vec<f64> = Vec::new();
        for t in &self.thresholds {
            if MetricKind::Trend.stats().contains(&t.stat.as_str()) {
                continue;
            }
            if let Some(pct) = t.percentile() {
                if !extra.iter().any(|e| (e - pct).abs() < f64::EPSILON) {
                    extra.push(pct);
                }
            }
        }
        extra
    }

    /// Number of thresholds
    #[must_use]
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// True when there is nothing to evaluate
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Evaluate every threshold
    #[must_use]
    pub fn evaluate(&self, aggregate: &MetricsAggregate) -> Vec<ThresholdResult> {
        self.thresholds
            .iter()
            .map(|t| t.evaluate(aggregate))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::{Metric, MetricKind, CHECKS, HTTP_REQ_DURATION};

    fn aggregate(failed_rate: f64, p95: f64) -> MetricsAggregate {
        let mut metrics = BTreeMap::new();
        let mut failed = BTreeMap::new();
        failed.insert("rate".to_string(), failed_rate);
        metrics.insert(
            HTTP_REQ_FAILED.to_string(),
            Metric {
                kind: MetricKind::Rate,
                values: failed,
            },
        );
        let mut duration = BTreeMap::new();
        duration.insert("p(95)".to_string(), p95);
        metrics.insert(
            HTTP_REQ_DURATION.to_string(),
            Metric {
                kind: MetricKind::Trend,
                values: duration,
            },
        );
        MetricsAggregate {
            metrics,
            duration_secs: 1.0,
        }
    }

    #[test]
    fn test_parse_expressions() {
        let t = Threshold::parse(HTTP_REQ_DURATION, "p(95)<500").unwrap();
        assert_eq!(t.stat, "p(95)");
        assert_eq!(t.op, Comparison::Lt);
        assert!((t.bound - 500.0).abs() < f64::EPSILON);

        let t = Threshold::parse(CHECKS, " rate >= 0.99 ").unwrap();
        assert_eq!(t.stat, "rate");
        assert_eq!(t.op, Comparison::Ge);
        assert_eq!(t.expression, "rate >= 0.99");

        for op in ["<", "<=", ">", ">=", "==", "!="] {
            let t = Threshold::parse(CHECKS, &format!("rate{op}1")).unwrap();
            assert_eq!(t.op.symbol(), op);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "p95<", "rate", "rate<<1", "rate<abc", "avg < 1 ms"] {
            let err = Threshold::parse(CHECKS, bad).unwrap_err();
            assert!(err.is_config(), "{bad}");
        }
    }

    #[test]
    fn test_parse_rejects_unknown_metric() {
        let err = Threshold::parse("http_req_waiting", "avg<1").unwrap_err();
        assert!(err.to_string().contains("unknown metric"));
    }

    #[test]
    fn test_global_threshold_always_present() {
        let set = ThresholdSet::with_defaults(&BTreeMap::new()).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.thresholds()[0].metric, HTTP_REQ_FAILED);
        assert_eq!(set.thresholds()[0].expression, "rate<0.01");
    }

    #[test]
    fn test_custom_thresholds_do_not_replace_global() {
        let mut custom = BTreeMap::new();
        custom.insert(HTTP_REQ_FAILED.to_string(), vec!["rate<0.5".to_string()]);
        custom.insert(HTTP_REQ_DURATION.to_string(), vec!["p(95)<500".to_string()]);
        let set = ThresholdSet::with_defaults(&custom).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set
            .thresholds()
            .iter()
            .any(|t| t.metric == HTTP_REQ_FAILED && t.expression == "rate<0.01"));
    }

    #[test]
    fn test_global_not_duplicated() {
        let mut custom = BTreeMap::new();
        custom.insert(HTTP_REQ_FAILED.to_string(), vec!["rate < 0.01".to_string()]);
        let set = ThresholdSet::with_defaults(&custom).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_evaluate() {
        let mut custom = BTreeMap::new();
        custom.insert(HTTP_REQ_DURATION.to_string(), vec!["p(95)<500".to_string()]);
        let set = ThresholdSet::with_defaults(&custom).unwrap();

        let results = set.evaluate(&aggregate(0.0, 120.0));
        assert!(results.iter().all(|r| r.passed));

        let results = set.evaluate(&aggregate(0.5, 120.0));
        let global = results.iter().find(|r| r.metric == HTTP_REQ_FAILED).unwrap();
        assert!(!global.passed);
        assert_eq!(global.actual, Some(0.5));
    }

    #[test]
    fn test_missing_stat_fails() {
        let t = Threshold::parse(HTTP_REQ_DURATION, "avg<100").unwrap();
        let result = t.evaluate(&aggregate(0.0, 1.0));
        assert!(!result.passed);
        assert_eq!(result.actual, None);
    }

    #[test]
    fn test_p50_reads_median() {
        let t = Threshold::parse(HTTP_REQ_DURATION, "p(50)<100").unwrap();
        assert_eq!(t.stat, "med");
        assert_eq!(t.expression, "p(50)<100");

        let mut agg = aggregate(0.0, 1.0);
        agg.metrics
            .get_mut(HTTP_REQ_DURATION)
            .unwrap()
            .values
            .insert("med".to_string(), 50.0);
        let result = t.evaluate(&agg);
        assert!(result.passed);
        assert_eq!(result.actual, Some(50.0));
    }

    #[test]
    fn test_percentile_keys_are_canonical() {
        assert_eq!(Threshold::parse(HTTP_REQ_DURATION, "p(95.0)<1").unwrap().stat, "p(95)");
        let t = Threshold::parse(HTTP_REQ_DURATION, "p( 99.9 )<1000").unwrap();
        assert_eq!(t.stat, "p(99.9)");
        assert_eq!(t.percentile(), Some(99.9));
    }

    #[test]
    fn test_parse_rejects_stat_the_metric_lacks() {
        for (metric, expr) in [
            (HTTP_REQ_DURATION, "rate<1"),
            (HTTP_REQ_DURATION, "p(101)<1"),
            (HTTP_REQ_DURATION, "median<1"),
            (CHECKS, "p(95)<1"),
            (HTTP_REQ_FAILED, "count<1"),
        ] {
            let err = Threshold::parse(metric, expr).unwrap_err();
            assert!(err.is_config(), "{metric} {expr}");
            assert!(err.to_string().contains("has no stat"), "{err}");
        }
    }

    #[test]
    fn test_extra_percentiles() {
        let mut custom = BTreeMap::new();
        custom.insert(
            HTTP_REQ_DURATION.to_string(),
            vec![
                "p(95)<500".to_string(),
                "p(50)<100".to_string(),
                "p(99.9)<1000".to_string(),
                "p(99.9)<2000".to_string(),
                "p(75)<300".to_string(),
            ],
        );
        let set = ThresholdSet::with_defaults(&custom).unwrap();
        assert_eq!(set.extra_percentiles(), vec![99.9, 75.0]);
    }
}
