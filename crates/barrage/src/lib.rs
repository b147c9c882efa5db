//! Barrage: profile-driven HTTP load testing
//!
//! Given a target endpoint, a request template and a named load profile
//! (smoke, load, stress, spike, soak), Barrage drives a time-varying
//! population of virtual users against the endpoint, aggregates k6-style
//! metrics, evaluates thresholds and emits CSV, JSON, HTML, JUnit and
//! console reports.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      BARRAGE Architecture                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  TestConfig ──► derive_plan ──► Scheduler ──► Transport           │
//! │                                    │             │                │
//! │                                    ▼             ▼                │
//! │                           RequestBuilder   MetricsCollector       │
//! │                                                  │                │
//! │                    Thresholds ◄── snapshot ◄─────┘                │
//! │                        │                                          │
//! │                        ▼                                          │
//! │              render_artifacts ──► ArtifactSink                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use barrage::{run_test, Cancellation, MemorySink, ReqwestTransport, RunOptions, TestConfig, TestType};
//! use std::sync::Arc;
//!
//! # async fn demo() -> barrage::BarrageResult<()> {
//! let config = TestConfig::builder(TestType::Smoke, "https://test-api.k6.io", "/public/crocodiles/")
//!     .threshold("http_req_duration", "p(95)<500")
//!     .build()?;
//! let transport = Arc::new(ReqwestTransport::new(std::time::Duration::from_secs(60))?);
//! let sink = MemorySink::new();
//! let outcome = run_test(config, transport, &sink, RunOptions::default(), Cancellation::new()).await?;
//! assert!(outcome.passed());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod config;
mod engine;
#[allow(clippy::cast_precision_loss)]
pub mod metrics;
mod profile;
pub mod report;
pub mod request;
mod result;
#[allow(clippy::cast_possible_truncation)]
mod scheduler;
mod sink;
mod transport;

pub use config::{TestConfig, TestConfigBuilder, DEFAULT_EXPECTED_STATUS};
pub use engine::{run_test, Engine, RunOptions, RunOutcome};
pub use metrics::{
    Metric, MetricKind, MetricsAggregate, MetricsCollector, RequestSample, Threshold,
    ThresholdResult, ThresholdSet,
};
pub use profile::{
    derive_plan, derive_plan_named, format_duration, ExecutorKind, ExecutorSpec, Stage, TestType,
};
pub use report::{
    latest_csv, render_artifacts, Artifact, ReportFormat, ReportMetadata, SummaryOptions, LATEST_CSV,
    STDOUT,
};
pub use request::{ConcreteRequest, ContentKind, HttpMethod, RequestBuilder, RequestTemplate};
pub use result::{BarrageError, BarrageResult};
pub use scheduler::{
    Cancellation, RunState, Scheduler, SchedulerOptions, DEFAULT_CONTROL_TICK,
    DEFAULT_ITERATION_PAUSE,
};
pub use sink::{write_artifacts, ArtifactSink, MemorySink, SinkError};
pub use transport::{
    ReqwestTransport, Transport, TransportError, TransportErrorKind, TransportResponse,
    DEFAULT_REQUEST_TIMEOUT,
};

/// Common imports
pub mod prelude {
    pub use super::{
        derive_plan, run_test, ArtifactSink, BarrageError, BarrageResult, Cancellation,
        ContentKind, Engine, ExecutorSpec, HttpMethod, MemorySink, ReqwestTransport, RunOptions,
        RunOutcome, TestConfig, TestType, Transport,
    };
}
