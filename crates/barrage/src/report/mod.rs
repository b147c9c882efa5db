//! Report emitter.
//!
//! [`render_artifacts`] is a pure function from the final aggregate,
//! threshold results and run metadata to named byte blobs. Writing them
//! anywhere is the sink's job.

mod csv;
mod html;
mod junit;
mod summary;

pub use csv::render_csv;
pub use html::render_html;
pub use junit::render_junit;
pub use summary::{render_summary, SummaryOptions};

use crate::config::TestConfig;
use crate::metrics::{Metric, MetricsAggregate, ThresholdResult};
use crate::profile::TestType;
use crate::request::HttpMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Artifact name that sinks route to standard output
pub const STDOUT: &str = "stdout";

/// Stable-name copy of the newest CSV report, for dashboards that poll one file
pub const LATEST_CSV: &str = "latest_results.csv";

/// A named report blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name, or [`STDOUT`]
    pub name: String,
    /// Rendered content
    pub content: Vec<u8>,
}

impl Artifact {
    /// Create an artifact
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Content as text
    #[must_use]
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// Output formats, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// `metric,type,value` rows
    Csv,
    /// Run metadata plus metrics and thresholds
    Json,
    /// Standalone HTML page
    Html,
    /// JUnit XML, one testcase per threshold
    Junit,
    /// Text summary for the terminal
    Summary,
}

impl ReportFormat {
    /// Every format
    pub const ALL: [Self; 5] = [Self::Csv, Self::Json, Self::Html, Self::Junit, Self::Summary];

    /// File extension, without the leading dot
    #[must_use]
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Csv => Some("csv"),
            Self::Json => Some("json"),
            Self::Html => Some("html"),
            Self::Junit => Some("junit.xml"),
            Self::Summary => None,
        }
    }
}

/// Who ran what, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// Scheme and host
    pub base_url: String,
    /// Display name of the request
    pub request_name: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request path
    pub endpoint: String,
    /// Load profile
    pub test_type: TestType,
    /// RFC 3339 start time
    pub timestamp: String,
    /// Unique id of this run
    pub run_id: Uuid,
    /// Peak concurrency the profile scaled from
    pub peak_concurrency: u32,
    /// Start time in unix millis, used for artifact names
    #[serde(skip)]
    pub started_at_ms: i64,
}

impl ReportMetadata {
    /// Metadata for a run of `config` starting now
    #[must_use]
    pub fn for_run(config: &TestConfig) -> Self {
        let now = chrono::Utc::now();
        Self {
            base_url: config.base_url.clone(),
            request_name: config.request_name.clone(),
            method: config.method,
            endpoint: config.endpoint.clone(),
            test_type: config.test_type,
            timestamp: now.to_rfc3339(),
            run_id: Uuid::new_v4(),
            peak_concurrency: config.peak_concurrency,
            started_at_ms: now.timestamp_millis(),
        }
    }

    /// Shared file-name stem: `<request>_<method>_<test type>-<millis>`
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}-{}",
            sanitize_name(&self.request_name),
            self.method.as_str().to_lowercase(),
            self.test_type,
            self.started_at_ms
        )
    }

    /// Artifact name for a format
    #[must_use]
    pub fn artifact_name(&self, format: ReportFormat) -> String {
        format
            .extension()
            .map_or_else(|| STDOUT.to_string(), |ext| format!("{}.{ext}", self.file_stem()))
    }
}

/// JSON report document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    #[serde(flatten)]
    metadata: &'a ReportMetadata,
    thresholds_passed: bool,
    thresholds: &'a [ThresholdResult],
    duration_secs: f64,
    metrics: &'a BTreeMap<String, Metric>,
}

/// Lowercase, keep `[a-z0-9_.-]`, collapse everything else into `_`
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_gap = false;
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-') {
            if pending_gap && !out.is_empty() {
                out.push('_');
            }
            pending_gap = false;
            out.push(c);
        } else {
            pending_gap = true;
        }
    }
    if out.is_empty() {
        "request".to_string()
    } else {
        out
    }
}

/// True when every threshold held
#[must_use]
pub fn thresholds_passed(thresholds: &[ThresholdResult]) -> bool {
    thresholds.iter().all(|t| t.passed)
}

/// Render the JSON report
#[must_use]
pub fn render_json(
    aggregate: &MetricsAggregate,
    thresholds: &[ThresholdResult],
    metadata: &ReportMetadata,
) -> String {
    let report = JsonReport {
        metadata,
        thresholds_passed: thresholds_passed(thresholds),
        thresholds,
        duration_secs: aggregate.duration_secs,
        metrics: &aggregate.metrics,
    };
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}

/// Render every artifact of a run, in [`ReportFormat::ALL`] order
#[must_use]
pub fn render_artifacts(
    aggregate: &MetricsAggregate,
    thresholds: &[ThresholdResult],
    metadata: &ReportMetadata,
    summary: SummaryOptions,
) -> Vec<Artifact> {
    ReportFormat::ALL
        .iter()
        .map(|&format| {
            let content = match format {
                ReportFormat::Csv => render_csv(aggregate),
                ReportFormat::Json => render_json(aggregate, thresholds, metadata),
                ReportFormat::Html => render_html(aggregate, thresholds, metadata),
                ReportFormat::Junit => render_junit(aggregate, thresholds, metadata),
                ReportFormat::Summary => render_summary(aggregate, thresholds, metadata, summary),
            };
            Artifact::new(metadata.artifact_name(format), content)
        })
        .collect()
}

/// Copy of the run's CSV artifact under [`LATEST_CSV`]
#[must_use]
pub fn latest_csv(artifacts: &[Artifact], metadata: &ReportMetadata) -> Option<Artifact> {
    let name = metadata.artifact_name(ReportFormat::Csv);
    artifacts
        .iter()
        .find(|a| a.name == name)
        .map(|a| Artifact::new(LATEST_CSV, a.content.clone()))
}

/// Escape XML/HTML special characters
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
