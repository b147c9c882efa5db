//! JUnit XML: one testcase per threshold, so CI can gate on a run.

use super::{escape_xml, ReportMetadata};
use crate::metrics::{format_number, MetricsAggregate, ThresholdResult};

/// Render the JUnit report
#[must_use]
pub fn render_junit(
    aggregate: &MetricsAggregate,
    thresholds: &[ThresholdResult],
    metadata: &ReportMetadata,
) -> String {
    let failures = thresholds.iter().filter(|t| !t.passed).count();
    let mut xml = String::new();

    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="{}" tests="{}" failures="{}" time="{:.3}" timestamp="{}">"#,
        escape_xml(&format!(
            "{} {} {}",
            metadata.test_type, metadata.method, metadata.request_name
        )),
        thresholds.len(),
        failures,
        aggregate.duration_secs,
        escape_xml(&metadata.timestamp),
    ));
    xml.push('\n');

    for t in thresholds {
        xml.push_str(&format!(
            r#"  <testcase classname="{}" name="{}">"#,
            escape_xml(&t.metric),
            escape_xml(&t.expression),
        ));
        xml.push('\n');

        if !t.passed {
            let actual = t.actual.map_or_else(|| "missing".to_string(), format_number);
            let message = format!("{} {} (actual: {actual})", t.metric, t.expression);
            xml.push_str(&format!(
                r#"    <failure message="{}">{}</failure>"#,
                escape_xml(&message),
                escape_xml(&message)
            ));
            xml.push('\n');
        }

        xml.push_str("  </testcase>\n");
    }

    xml.push_str("</testsuite>\n");
    xml
}
