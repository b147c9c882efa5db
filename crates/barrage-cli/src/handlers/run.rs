//! `barrage run`: one catalog request, one or more test types, in order.

use crate::catalog::{Catalog, RunTarget};
use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::sink::DirectorySink;
use barrage::{
    Cancellation, Engine, ReqwestTransport, RunOptions, RunOutcome, SummaryOptions, TestConfig,
    TestType, Transport,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Parse `--test` values: names, or 1-based numbers in profile order
pub fn parse_test_types(raw: &[String]) -> CliResult<Vec<TestType>> {
    let types = raw
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<usize>() {
            Ok(n) => n
                .checked_sub(1)
                .and_then(|i| TestType::ALL.get(i).copied())
                .ok_or_else(|| CliError::config(format!("no test type number {n} (expected 1-5)"))),
            Err(_) => s.parse::<TestType>().map_err(CliError::from),
        })
        .collect::<CliResult<Vec<_>>>()?;
    if types.is_empty() {
        return Err(CliError::config("no test types selected"));
    }
    Ok(types)
}

/// Every config this invocation will run, validated up front
pub fn resolve_configs(args: &RunArgs) -> CliResult<Vec<TestConfig>> {
    if args.from_env {
        let vars: HashMap<String, String> = std::env::vars().collect();
        return Ok(vec![TestConfig::from_env(&vars)?]);
    }

    let test_types = parse_test_types(&args.test)?;
    let base_url = args
        .base_url
        .as_deref()
        .ok_or_else(|| CliError::config("--base-url (or BASE_URL) is required"))?;
    let peak = args
        .peak
        .ok_or_else(|| CliError::config("--peak (or PEAK_VUS) is required"))?;
    let catalog = Catalog::load(&args.catalog)?;
    let request = catalog.select(args.request.as_deref())?;

    let target = RunTarget {
        base_url,
        auth_token: args.token.as_deref(),
        peak,
    };
    test_types
        .into_iter()
        .map(|test_type| request.to_config(test_type, &target))
        .collect()
}

fn title(test_type: TestType) -> String {
    let name = test_type.as_str();
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + chars.as_str()
    })
}

/// Execute the run command
pub async fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let configs = resolve_configs(args)?;
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new(Duration::from_secs(args.timeout))?);
    let sink = DirectorySink::create(&args.output)?;
    let use_color = config.color.should_color();
    let mut reporter = ProgressReporter::new(use_color, config.verbosity.is_quiet());
    let options = RunOptions {
        summary: SummaryOptions::with_colors(use_color),
        latest_csv: args.latest_csv,
        ..RunOptions::default()
    };

    let cancel = Cancellation::new();
    let forced = forced_exit(tokio::signal::ctrl_c, cancel.clone());
    tokio::select! {
        result = run_in_order(configs, transport, &sink, options, &cancel, &mut reporter) => result,
        () = forced => Err(CliError::ForcedExit),
    }
}

/// Resolves on the second interrupt. The first one cancels `cancel` so the
/// run drains and still writes its reports.
async fn forced_exit<S, F>(mut signal: S, cancel: Cancellation)
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if signal().await.is_err() {
        return std::future::pending().await;
    }
    warn!("interrupt received, draining virtual users (interrupt again to exit now)");
    cancel.cancel();
    if signal().await.is_err() {
        return std::future::pending().await;
    }
    warn!("second interrupt received, abandoning in-flight requests");
}

async fn run_in_order(
    configs: Vec<TestConfig>,
    transport: Arc<dyn Transport>,
    sink: &DirectorySink,
    options: RunOptions,
    cancel: &Cancellation,
    reporter: &mut ProgressReporter,
) -> CliResult<()> {
    for config in configs {
        let test_type = config.test_type;
        reporter.header(&format!(
            "Starting: {} Test on '{}'\n  Scaled for {} peak VUs",
            title(test_type),
            config.request_name,
            config.peak_concurrency
        ));

        let engine = Engine::new(config, Arc::clone(&transport), options)?;
        reporter.follow(
            test_type.as_str(),
            engine.planned_duration(),
            engine.collector(),
            engine.subscribe(),
        );
        let outcome = engine.run(sink, cancel.clone()).await;
        reporter.finish().await;
        let outcome = outcome?;

        report_outcome(reporter, &outcome, sink);
        judge(&outcome)?;
        info!(test_type = %test_type, "test finished");
    }
    Ok(())
}

fn report_outcome(reporter: &ProgressReporter, outcome: &RunOutcome, sink: &DirectorySink) {
    let test = title(outcome.metadata.test_type);
    if outcome.passed() {
        reporter.success(&format!("{test} Test Finished: all thresholds passed"));
    } else {
        reporter.failure(&format!("{test} Test Finished: thresholds crossed"));
        for t in outcome.failed_thresholds() {
            let actual = t
                .actual
                .map_or_else(|| "no data".to_string(), barrage::metrics::format_number);
            reporter.failure(&format!("  {}: {} (actual {actual})", t.metric, t.expression));
        }
    }
    for failure in &outcome.write_failures {
        reporter.warning(&failure.to_string());
    }
    reporter.info(&format!(
        "Reports written to {} ({} files)",
        sink.dir().display(),
        outcome
            .artifacts_written
            .iter()
            .filter(|name| name.as_str() != barrage::STDOUT)
            .count()
    ));
}

/// Map an outcome to the invocation result; stops the sequence on the first failure
fn judge(outcome: &RunOutcome) -> CliResult<()> {
    let test_type = outcome.metadata.test_type;
    if !outcome.passed() {
        return Err(CliError::ThresholdsFailed {
            test_type: test_type.to_string(),
            failed: outcome
                .failed_thresholds()
                .map(|t| format!("{}: {}", t.metric, t.expression))
                .collect(),
        });
    }
    if outcome.cancelled {
        return Err(CliError::run(format!("{test_type} test interrupted")));
    }
    if !outcome.write_failures.is_empty() {
        return Err(CliError::run(format!(
            "{} report(s) could not be written",
            outcome.write_failures.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    fn args(catalog: PathBuf, tests: &[&str]) -> RunArgs {
        RunArgs {
            catalog,
            request: Some("Health".to_string()),
            test: tests.iter().map(ToString::to_string).collect(),
            peak: Some(10),
            base_url: Some("http://localhost:8080".to_string()),
            token: None,
            output: PathBuf::from("results"),
            timeout: 60,
            latest_csv: false,
            from_env: false,
        }
    }

    fn catalog_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"requests": [{"name": "Health", "endpoint": "/health", "method": "GET"}]}"#,
        )
        .unwrap();
        path
    }

    type SignalFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

    fn notified(notify: &Arc<Notify>) -> impl FnMut() -> SignalFuture {
        let notify = Arc::clone(notify);
        move || -> SignalFuture {
            let notify = Arc::clone(&notify);
            Box::pin(async move {
                notify.notified().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_first_interrupt_drains_second_exits() {
        let notify = Arc::new(Notify::new());
        let cancel = Cancellation::new();
        let task = tokio::spawn(forced_exit(notified(&notify), cancel.clone()));

        notify.notify_one();
        while !cancel.is_cancelled() {
            tokio::task::yield_now().await;
        }
        assert!(!task.is_finished());

        notify.notify_one();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_signal_errors_never_force_exit() {
        let cancel = Cancellation::new();
        let failing = || async { Err(std::io::Error::other("no signal handler")) };
        let result =
            tokio::time::timeout(Duration::from_millis(100), forced_exit(failing, cancel.clone()))
                .await;
        assert!(result.is_err());
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_parse_test_types_by_name_and_number() {
        let raw = vec!["1".to_string(), " stress ".to_string(), "5".to_string()];
        assert_eq!(
            parse_test_types(&raw).unwrap(),
            vec![TestType::Smoke, TestType::Stress, TestType::Soak]
        );
    }

    #[test]
    fn test_parse_test_types_rejects_unknown() {
        assert!(parse_test_types(&["6".to_string()]).is_err());
        assert!(parse_test_types(&["0".to_string()]).is_err());
        assert!(parse_test_types(&["endurance".to_string()]).is_err());
        assert!(parse_test_types(&[String::new()]).is_err());
    }

    #[test]
    fn test_resolve_configs_keeps_order() {
        let dir = TempDir::new().unwrap();
        let configs = resolve_configs(&args(catalog_file(&dir), &["load", "smoke"])).unwrap();
        let types: Vec<_> = configs.iter().map(|c| c.test_type).collect();
        assert_eq!(types, vec![TestType::Load, TestType::Smoke]);
        assert!(configs.iter().all(|c| c.base_url == "http://localhost:8080"));
        assert!(configs.iter().all(|c| c.peak_concurrency == 10));
    }

    #[test]
    fn test_resolve_configs_requires_peak_and_base_url() {
        let dir = TempDir::new().unwrap();
        let mut missing_peak = args(catalog_file(&dir), &["smoke"]);
        missing_peak.peak = None;
        assert!(resolve_configs(&missing_peak).unwrap_err().to_string().contains("--peak"));

        let mut missing_url = args(catalog_file(&dir), &["smoke"]);
        missing_url.base_url = None;
        assert!(resolve_configs(&missing_url)
            .unwrap_err()
            .to_string()
            .contains("--base-url"));
    }

    #[test]
    fn test_title() {
        assert_eq!(title(TestType::Smoke), "Smoke");
        assert_eq!(title(TestType::Spike), "Spike");
    }
}
