//! CSV export: one `metric,type,"key=value"` row per stat.

use crate::metrics::{format_number, MetricsAggregate};

/// Render the CSV report
#[must_use]
pub fn render_csv(aggregate: &MetricsAggregate) -> String {
    let mut csv = String::from("metric,type,value\n");
    for (name, metric) in &aggregate.metrics {
        for (key, value) in &metric.values {
            csv.push_str(&format!(
                "{name},{},\"{key}={}\"\n",
                metric.kind,
                format_number(*value)
            ));
        }
    }
    csv
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::report::fixtures;

    #[test]
    fn test_header_and_rows() {
        let csv = render_csv(&fixtures::aggregate());
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("metric,type,value"));
        assert!(csv.contains("checks,rate,\"rate=0.75\"\n"));
        assert!(csv.contains("checks,rate,\"passes=3\"\n"));
        assert!(csv.contains("http_reqs,counter,\"count=4\"\n"));
        assert!(csv.contains("http_reqs,counter,\"rate=1\"\n"));
        assert!(csv.contains("http_req_duration,trend,\"p(95)=100\"\n"));
        assert!(csv.contains("vus_max,gauge,\"value=2\"\n"));
    }

    #[test]
    fn test_every_row_has_three_fields() {
        let csv = render_csv(&fixtures::aggregate());
        for line in csv.lines().skip(1) {
            let (name, rest) = line.split_once(',').unwrap();
            let (kind, value) = rest.split_once(',').unwrap();
            assert!(!name.is_empty());
            assert!(["counter", "rate", "trend", "gauge"].contains(&kind));
            assert!(value.starts_with('"') && value.ends_with('"') && value.contains('='));
        }
    }

    #[test]
    fn test_empty_aggregate() {
        assert_eq!(
            render_csv(&MetricsAggregate::default()),
            "metric,type,value\n"
        );
    }
}
