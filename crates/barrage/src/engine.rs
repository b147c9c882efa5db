//! One complete run: schedule, aggregate, judge, report.

use crate::config::TestConfig;
use crate::metrics::{MetricsAggregate, MetricsCollector, ThresholdResult, ThresholdSet};
use crate::report::{
    latest_csv, render_artifacts, thresholds_passed, ReportMetadata, SummaryOptions,
};
use crate::result::BarrageResult;
use crate::scheduler::{Cancellation, RunState, Scheduler, SchedulerOptions};
use crate::sink::{write_artifacts, ArtifactSink, SinkError};
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Options for [`Engine`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Scheduler tuning
    pub scheduler: SchedulerOptions,
    /// Console summary rendering
    pub summary: SummaryOptions,
    /// Also write the CSV report as `latest_results.csv`
    pub latest_csv: bool,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Run metadata, as written into the reports
    pub metadata: ReportMetadata,
    /// Final metrics
    pub aggregate: MetricsAggregate,
    /// Every threshold, including the global safety threshold
    pub thresholds: Vec<ThresholdResult>,
    /// Names of artifacts that were written
    pub artifacts_written: Vec<String>,
    /// Artifacts that could not be written
    pub write_failures: Vec<SinkError>,
    /// Wall time of the run
    pub elapsed: Duration,
    /// Whether the run was cut short by cancellation
    pub cancelled: bool,
}

impl RunOutcome {
    /// True when every threshold held
    #[must_use]
    pub fn passed(&self) -> bool {
        thresholds_passed(&self.thresholds)
    }

    /// Thresholds that did not hold
    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

/// A configured, not yet started run.
///
/// Construction validates the config and parses every threshold, so a bad
/// config fails before any virtual user exists.
#[derive(Debug)]
pub struct Engine {
    config: Arc<TestConfig>,
    thresholds: ThresholdSet,
    collector: Arc<MetricsCollector>,
    scheduler: Scheduler,
    options: RunOptions,
}

impl Engine {
    /// Prepare a run
    pub fn new(
        config: TestConfig,
        transport: Arc<dyn Transport>,
        options: RunOptions,
    ) -> BarrageResult<Self> {
        config.validate()?;
        let thresholds = config.thresholds()?;
        let collector = Arc::new(MetricsCollector::new()?);
        let scheduler = Scheduler::new(
            &config,
            transport,
            Arc::clone(&collector),
            options.scheduler,
        );
        Ok(Self {
            config: Arc::new(config),
            thresholds,
            collector,
            scheduler,
            options,
        })
    }

    /// The config being run
    #[must_use]
    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Live metrics, for progress display
    #[must_use]
    pub fn collector(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.collector)
    }

    /// Watch the scheduler state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.scheduler.subscribe()
    }

    /// Planned run duration
    #[must_use]
    pub fn planned_duration(&self) -> Duration {
        self.scheduler.plan().total_duration()
    }

    /// Run to completion, then write every artifact to `sink`
    pub async fn run(
        &self,
        sink: &dyn ArtifactSink,
        cancel: Cancellation,
    ) -> BarrageResult<RunOutcome> {
        let metadata = ReportMetadata::for_run(&self.config);
        info!(
            run_id = %metadata.run_id,
            test_type = %self.config.test_type,
            method = %self.config.method,
            url = %self.config.template().url(),
            peak = self.config.peak_concurrency,
            "starting load test"
        );

        let elapsed = self.scheduler.run(cancel.clone()).await?;
        let aggregate = self
            .collector
            .snapshot_with_percentiles(elapsed, &self.thresholds.extra_percentiles());
        let thresholds = self.thresholds.evaluate(&aggregate);
        for t in thresholds.iter().filter(|t| !t.passed) {
            warn!(metric = %t.metric, expression = %t.expression, actual = ?t.actual, "threshold failed");
        }

        let mut artifacts =
            render_artifacts(&aggregate, &thresholds, &metadata, self.options.summary);
        if self.options.latest_csv {
            if let Some(latest) = latest_csv(&artifacts, &metadata) {
                artifacts.push(latest);
            }
        }
        let write_failures = write_artifacts(sink, &artifacts);
        let artifacts_written = artifacts
            .iter()
            .filter(|a| !write_failures.iter().any(|f| f.artifact == a.name))
            .map(|a| a.name.clone())
            .collect();

        let outcome = RunOutcome {
            metadata,
            aggregate,
            thresholds,
            artifacts_written,
            write_failures,
            elapsed,
            cancelled: cancel.is_cancelled(),
        };
        info!(
            passed = outcome.passed(),
            requests = self.collector.request_count(),
            elapsed_ms = elapsed.as_millis() as u64,
            "load test complete"
        );
        Ok(outcome)
    }
}

/// Validate, run and report in one call
pub async fn run_test(
    config: TestConfig,
    transport: Arc<dyn Transport>,
    sink: &dyn ArtifactSink,
    options: RunOptions,
    cancel: Cancellation,
) -> BarrageResult<RunOutcome> {
    Engine::new(config, transport, options)?
        .run(sink, cancel)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::profile::TestType;
    use crate::report::LATEST_CSV;
    use crate::request::ConcreteRequest;
    use crate::sink::MemorySink;
    use crate::transport::{TransportError, TransportResponse};
    use async_trait::async_trait;

    struct Ok200;

    #[async_trait]
    impl Transport for Ok200 {
        async fn send(&self, _: &ConcreteRequest) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse::new(200, "{}"))
        }
    }

    #[test]
    fn test_bad_threshold_fails_before_running() {
        let mut config = TestConfig::builder(TestType::Smoke, "http://localhost", "/")
            .build()
            .unwrap();
        config
            .custom_thresholds
            .insert("http_req_duration".to_string(), vec!["p95 under 500".to_string()]);
        let err = Engine::new(config, Arc::new(Ok200), RunOptions::default()).unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_writes_all_artifacts() {
        let config = TestConfig::builder(TestType::Smoke, "http://localhost", "/health")
            .request_name("Health")
            .build()
            .unwrap();
        let sink = MemorySink::new();
        let outcome = run_test(
            config,
            Arc::new(Ok200),
            &sink,
            RunOptions::default(),
            Cancellation::new(),
        )
        .await
        .unwrap();

        assert!(outcome.passed());
        assert!(!outcome.cancelled);
        assert_eq!(outcome.artifacts_written.len(), 5);
        assert!(outcome.write_failures.is_empty());
        assert_eq!(sink.len(), 5);
        assert!(sink.get("stdout").is_some());
        assert!(outcome
            .artifacts_written
            .iter()
            .any(|n| n.starts_with("health_get_smoke-") && n.ends_with(".csv")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_csv_copy() {
        let config = TestConfig::builder(TestType::Smoke, "http://localhost", "/health")
            .request_name("Health")
            .build()
            .unwrap();
        let sink = MemorySink::new();
        let options = RunOptions {
            latest_csv: true,
            ..RunOptions::default()
        };
        let outcome = run_test(config, Arc::new(Ok200), &sink, options, Cancellation::new())
            .await
            .unwrap();

        assert_eq!(sink.len(), 6);
        let stamped = outcome
            .artifacts_written
            .iter()
            .find(|n| n.starts_with("health_get_smoke-") && n.ends_with(".csv"))
            .unwrap();
        assert_eq!(sink.get(LATEST_CSV), sink.get(stamped));
        assert!(outcome.artifacts_written.iter().any(|n| n == LATEST_CSV));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_still_reports() {
        let config = TestConfig::builder(TestType::Soak, "http://localhost", "/")
            .peak_concurrency(5)
            .build()
            .unwrap();
        let engine = Engine::new(config, Arc::new(Ok200), RunOptions::default()).unwrap();
        assert_eq!(engine.planned_duration(), Duration::from_secs(3600));

        let cancel = Cancellation::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });
        let sink = MemorySink::new();
        let outcome = engine.run(&sink, cancel).await.unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.elapsed < Duration::from_secs(5));
        assert_eq!(sink.len(), 5);
    }
}
