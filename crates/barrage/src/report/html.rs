//! Standalone HTML report.

use super::{escape_xml, thresholds_passed, ReportMetadata};
use crate::metrics::{format_number, MetricsAggregate, ThresholdResult};

/// Render the HTML report
#[must_use]
pub fn render_html(
    aggregate: &MetricsAggregate,
    thresholds: &[ThresholdResult],
    metadata: &ReportMetadata,
) -> String {
    let mut html = String::new();
    let title = format!(
        "{} {} ({})",
        metadata.method, metadata.request_name, metadata.test_type
    );

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Barrage Report: {}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }}
        .summary {{ background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }}
        .banner {{ padding: 12px 20px; border-radius: 8px; color: #fff; font-weight: bold; }}
        .banner.pass {{ background: #4caf50; }}
        .banner.fail {{ background: #f44336; }}
        table {{ border-collapse: collapse; width: 100%; margin-bottom: 20px; }}
        th, td {{ text-align: left; padding: 6px 10px; border-bottom: 1px solid #ddd; }}
        th {{ background: #fafafa; }}
        td.num {{ font-family: monospace; text-align: right; }}
        .threshold {{ padding: 10px; margin: 5px 0; border-radius: 4px; font-family: monospace; }}
        .threshold.pass {{ background: #e8f5e9; border-left: 4px solid #4caf50; }}
        .threshold.fail {{ background: #ffebee; border-left: 4px solid #f44336; }}
    </style>
</head>
<body>
"#,
        escape_xml(&title)
    ));

    let passed = thresholds_passed(thresholds);
    let (class, verdict) = if passed {
        ("pass", "All thresholds passed")
    } else {
        ("fail", "Thresholds failed")
    };
    html.push_str(&format!(
        r#"<div class="summary">
    <h1>{}</h1>
    <div class="banner {class}">{verdict}</div>
    <p>Target: <code>{}{}</code></p>
    <p>Started: {} &middot; Duration: {:.2}s &middot; Peak VUs: {} &middot; Run: {}</p>
</div>
"#,
        escape_xml(&title),
        escape_xml(&metadata.base_url),
        escape_xml(&metadata.endpoint),
        escape_xml(&metadata.timestamp),
        aggregate.duration_secs,
        metadata.peak_concurrency,
        metadata.run_id,
    ));

    html.push_str("<h2>Thresholds</h2>\n");
    for t in thresholds {
        let class = if t.passed { "pass" } else { "fail" };
        let actual = t.actual.map_or_else(|| "n/a".to_string(), format_number);
        html.push_str(&format!(
            "<div class=\"threshold {class}\">{} {} {} (actual: {actual})</div>\n",
            if t.passed { "&#10003;" } else { "&#10007;" },
            escape_xml(&t.metric),
            escape_xml(&t.expression),
        ));
    }

    html.push_str("<h2>Metrics</h2>\n<table>\n");
    html.push_str("<tr><th>Metric</th><th>Type</th><th>Stat</th><th>Value</th></tr>\n");
    for (name, metric) in &aggregate.metrics {
        for (key, value) in &metric.values {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>\n",
                escape_xml(name),
                metric.kind,
                escape_xml(key),
                format_number(*value)
            ));
        }
    }
    html.push_str("</table>\n");

    html.push_str("</body>\n</html>\n");
    html
}
