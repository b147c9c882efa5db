//! Console summary in the k6 text-summary layout.

use super::{thresholds_passed, ReportMetadata};
use crate::metrics::{format_number, Metric, MetricKind, MetricsAggregate, ThresholdResult};
use console::style;

/// Dotted name column width
const NAME_WIDTH: usize = 32;

/// Console summary rendering options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryOptions {
    /// Emit ANSI colors
    pub colors: bool,
}

impl SummaryOptions {
    /// Options with colors on or off
    #[must_use]
    pub const fn with_colors(colors: bool) -> Self {
        Self { colors }
    }
}

/// Render the console summary
#[must_use]
pub fn render_summary(
    aggregate: &MetricsAggregate,
    thresholds: &[ThresholdResult],
    metadata: &ReportMetadata,
    options: SummaryOptions,
) -> String {
    let colors = options.colors;
    let mut out = String::new();

    out.push_str(&format!(
        "\n  {} {} {} ({} test, peak {} VUs)\n",
        style("BARRAGE").bold().force_styling(colors),
        metadata.method,
        metadata.request_name,
        metadata.test_type,
        metadata.peak_concurrency
    ));
    out.push_str(&format!(
        "  {}{}  run {}\n",
        metadata.base_url, metadata.endpoint, metadata.run_id
    ));
    out.push_str("  ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for (name, metric) in &aggregate.metrics {
        let mark = threshold_mark(name, thresholds, colors);
        let dots = ".".repeat(NAME_WIDTH.saturating_sub(name.len()));
        out.push_str(&format!(
            "  {mark}{name}{dots}: {}\n",
            describe(name, metric, colors)
        ));
        for t in thresholds.iter().filter(|t| &t.metric == name) {
            let (symbol, actual) = threshold_line(t, colors);
            out.push_str(&format!("      {symbol} '{}' {actual}\n", t.expression));
        }
    }

    let verdict = if thresholds_passed(thresholds) {
        style("✓ all thresholds passed").green()
    } else {
        style("✗ some thresholds have failed").red()
    };
    out.push_str(&format!(
        "\n  {}  ({:.1}s)\n",
        verdict.force_styling(colors),
        aggregate.duration_secs
    ));
    out
}

fn threshold_mark(name: &str, thresholds: &[ThresholdResult], colors: bool) -> String {
    let mut relevant = thresholds.iter().filter(|t| t.metric == name).peekable();
    if relevant.peek().is_none() {
        return "  ".to_string();
    }
    if relevant.all(|t| t.passed) {
        format!("{} ", style("✓").green().force_styling(colors))
    } else {
        format!("{} ", style("✗").red().force_styling(colors))
    }
}

fn threshold_line(t: &ThresholdResult, colors: bool) -> (String, String) {
    let symbol = if t.passed {
        style("✓").green().force_styling(colors).to_string()
    } else {
        style("✗").red().force_styling(colors).to_string()
    };
    let actual = t.actual.map_or_else(
        || "(no value)".to_string(),
        |v| format!("(actual: {})", format_number(v)),
    );
    (symbol, actual)
}

fn stat(metric: &Metric, key: &str) -> f64 {
    metric.value(key).unwrap_or(0.0)
}

fn describe(name: &str, metric: &Metric, colors: bool) -> String {
    let cyan = |s: String| style(s).cyan().force_styling(colors).to_string();
    match metric.kind {
        MetricKind::Rate => format!(
            "{} {} {} {} {}",
            cyan(format!("{:.2}%", stat(metric, "rate") * 100.0)),
            style("✓").green().force_styling(colors),
            format_number(stat(metric, "passes")),
            style("✗").red().force_styling(colors),
            format_number(stat(metric, "fails")),
        ),
        MetricKind::Trend => MetricKind::Trend
            .stats()
            .iter()
            .filter_map(|key| metric.value(key).map(|v| (key, v)))
            .map(|(key, v)| format!("{key}={}", cyan(format_millis(v))))
            .collect::<Vec<_>>()
            .join(" "),
        MetricKind::Counter => {
            let count = stat(metric, "count");
            let rate = stat(metric, "rate");
            if name.starts_with("data_") {
                format!(
                    "{} {}/s",
                    cyan(format_bytes(count)),
                    format_bytes(rate)
                )
            } else {
                format!("{} {:.2}/s", cyan(format_number(count)), rate)
            }
        }
        MetricKind::Gauge => format!(
            "{} min={} max={}",
            cyan(format_number(stat(metric, "value"))),
            format_number(stat(metric, "min")),
            format_number(stat(metric, "max")),
        ),
    }
}

/// Milliseconds with a unit that keeps the number readable
fn format_millis(ms: f64) -> String {
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else if ms >= 1.0 {
        format!("{ms:.2}ms")
    } else {
        format!("{:.2}µs", ms * 1000.0)
    }
}

fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["B", "kB", "MB", "GB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::report::fixtures;

    fn plain(passed: bool) -> String {
        render_summary(
            &fixtures::aggregate(),
            &fixtures::thresholds(passed),
            &fixtures::metadata(),
            SummaryOptions::default(),
        )
    }

    #[test]
    fn test_summary_lists_metrics() {
        let text = plain(true);
        assert!(text.contains("POST Create User (load test, peak 10 VUs)"));
        assert!(text.contains("checks"));
        assert!(text.contains("75.00% ✓ 3 ✗ 1"));
        assert!(text.contains("avg=100.00ms"));
        assert!(text.contains("p(95)=100.00ms"));
        assert!(text.contains("http_reqs"));
        assert!(text.contains("4 1.00/s"));
        assert!(text.contains("200 B"));
    }

    #[test]
    fn test_summary_thresholds() {
        let text = plain(true);
        assert!(text.contains("✓ 'rate<0.01' (actual: 0.25)"));
        assert!(text.contains("all thresholds passed"));

        let text = plain(false);
        assert!(text.contains("✗ 'rate<0.01'"));
        assert!(text.contains("some thresholds have failed"));
    }

    #[test]
    fn test_summary_without_colors_has_no_escapes() {
        assert!(!plain(false).contains('\u{1b}'));
    }

    #[test]
    fn test_summary_with_colors() {
        let text = render_summary(
            &fixtures::aggregate(),
            &fixtures::thresholds(false),
            &fixtures::metadata(),
            SummaryOptions::with_colors(true),
        );
        assert!(text.contains('\u{1b}'));
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_millis(1500.0), "1.50s");
        assert_eq!(format_millis(12.5), "12.50ms");
        assert_eq!(format_millis(0.25), "250.00µs");
        assert_eq!(format_bytes(999.0), "999 B");
        assert_eq!(format_bytes(1500.0), "1.5 kB");
        assert_eq!(format_bytes(2_000_000.0), "2.0 MB");
    }
}
