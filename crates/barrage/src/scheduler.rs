//! Virtual user scheduler.
//!
//! A controller task re-evaluates the plan's target concurrency every tick
//! and fills worker slots `0..target`. Each worker owns one slot and runs
//! the iteration loop (build, send, record, pause) until its slot falls
//! outside the target or the run stops being [`RunState::Running`].
//!
//! Requests already in flight when draining starts always complete and are
//! recorded; only the inter-iteration pause is interrupted.

use crate::config::TestConfig;
use crate::metrics::{MetricsCollector, RequestSample};
use crate::profile::ExecutorSpec;
use crate::request::{RequestBuilder, RequestTemplate};
use crate::result::{BarrageError, BarrageResult};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default pause between iterations of one virtual user
pub const DEFAULT_ITERATION_PAUSE: Duration = Duration::from_secs(1);

/// Default controller tick
pub const DEFAULT_CONTROL_TICK: Duration = Duration::from_millis(100);

/// Longest response body echoed by the first-response log
const FIRST_RESPONSE_LOG_LIMIT: usize = 2048;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Not started
    Idle,
    /// Workers are being spawned and iterating
    Running,
    /// Deadline reached or cancelled; waiting for workers to exit
    Draining,
    /// All workers exited
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Draining => write!(f, "draining"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Scheduler tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Pause after each iteration
    pub iteration_pause: Duration,
    /// How often the controller re-evaluates the target
    pub control_tick: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            iteration_pause: DEFAULT_ITERATION_PAUSE,
            control_tick: DEFAULT_CONTROL_TICK,
        }
    }
}

/// Operator cancellation flag.
///
/// Cloning shares the flag. Cancelling moves a running scheduler to
/// draining; it never aborts requests in flight.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    /// A flag that is not yet cancelled
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request graceful shutdown
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// State shared by every worker of one run
struct WorkerContext {
    template: RequestTemplate,
    token: Option<String>,
    expected_status: u16,
    transport: Arc<dyn Transport>,
    collector: Arc<MetricsCollector>,
    pause: Duration,
    target: watch::Receiver<u32>,
    state: watch::Receiver<RunState>,
    first_response_logged: AtomicBool,
}

/// Drives a population of virtual users through a stage plan.
pub struct Scheduler {
    plan: ExecutorSpec,
    template: RequestTemplate,
    token: Option<String>,
    expected_status: u16,
    transport: Arc<dyn Transport>,
    collector: Arc<MetricsCollector>,
    options: SchedulerOptions,
    state: watch::Sender<RunState>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("plan", &self.plan)
            .field("url", &self.template.url())
            .field("options", &self.options)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler for a validated config
    #[must_use]
    pub fn new(
        config: &TestConfig,
        transport: Arc<dyn Transport>,
        collector: Arc<MetricsCollector>,
        options: SchedulerOptions,
    ) -> Self {
        Self::with_plan(config.plan(), config, transport, collector, options)
    }

    /// Create a scheduler that runs an explicit plan instead of the
    /// config's profile
    #[must_use]
    pub fn with_plan(
        plan: ExecutorSpec,
        config: &TestConfig,
        transport: Arc<dyn Transport>,
        collector: Arc<MetricsCollector>,
        options: SchedulerOptions,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            plan,
            template: config.template(),
            token: config.auth_token.clone(),
            expected_status: config.expected_status,
            transport,
            collector,
            options,
            state,
        }
    }

    /// The plan being executed
    #[must_use]
    pub const fn plan(&self) -> &ExecutorSpec {
        &self.plan
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Run the plan to completion. Returns the elapsed run time.
    ///
    /// Fails with [`BarrageError::InvalidState`] unless the scheduler is
    /// idle; a scheduler runs once.
    pub async fn run(&self, cancel: Cancellation) -> BarrageResult<Duration> {
        let mut previous = RunState::Idle;
        let started = self.state.send_if_modified(|state| {
            previous = *state;
            let idle = *state == RunState::Idle;
            if idle {
                *state = RunState::Running;
            }
            idle
        });
        if !started {
            return Err(BarrageError::invalid_state(format!(
                "scheduler already {previous}"
            )));
        }

        let total = self.plan.total_duration();
        let (target_tx, target_rx) = watch::channel(0u32);
        self.collector.set_vus_max(self.plan.max_target());
        info!(
            executor = %self.plan.kind,
            duration_secs = total.as_secs(),
            max_vus = self.plan.max_target(),
            "run started"
        );

        let context = Arc::new(WorkerContext {
            template: self.template.clone(),
            token: self.token.clone(),
            expected_status: self.expected_status,
            transport: Arc::clone(&self.transport),
            collector: Arc::clone(&self.collector),
            pause: self.options.iteration_pause,
            target: target_rx,
            state: self.state.subscribe(),
            first_response_logged: AtomicBool::new(false),
        });

        let start = Instant::now();
        let mut cancel_rx = cancel.subscribe();
        let mut interval = tokio::time::interval(self.options.control_tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut slots: Vec<Option<JoinHandle<()>>> = Vec::new();
        let mut current_target: Option<u32> = None;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = cancel_rx.changed() => {
                    if changed.is_err() {
                        interval.tick().await;
                    }
                }
            }

            let elapsed = start.elapsed();
            if *cancel_rx.borrow() {
                info!(elapsed_ms = elapsed.as_millis() as u64, "run cancelled");
                break;
            }
            if elapsed >= total {
                break;
            }

            let target = self.plan.target_at(elapsed);
            if current_target != Some(target) {
                debug!(target, elapsed_ms = elapsed.as_millis() as u64, "target changed");
                current_target = Some(target);
                target_tx.send_replace(target);
            }

            reap_finished(&mut slots);
            let wanted = target as usize;
            if slots.len() < wanted {
                slots.resize_with(wanted, || None);
            }
            for (id, slot) in slots.iter_mut().enumerate().take(wanted) {
                if slot.is_none() {
                    let ctx = Arc::clone(&context);
                    let id = id as u32;
                    debug!(worker = id, "spawning virtual user");
                    *slot = Some(tokio::spawn(run_worker(id, ctx)));
                }
            }

            let live = slots.iter().flatten().count();
            self.collector.set_vus(u32::try_from(live).unwrap_or(u32::MAX));
        }

        self.drain(slots, &target_tx).await;
        let elapsed = start.elapsed();
        self.state.send_replace(RunState::Done);
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            requests = self.collector.request_count(),
            "run finished"
        );
        Ok(elapsed)
    }

    async fn drain(&self, slots: Vec<Option<JoinHandle<()>>>, target: &watch::Sender<u32>) {
        self.state.send_replace(RunState::Draining);
        target.send_replace(0);
        let in_flight = slots.iter().flatten().count();
        debug!(workers = in_flight, "draining");
        let results = futures::future::join_all(slots.into_iter().flatten()).await;
        for e in results.into_iter().filter_map(Result::err) {
            warn!(error = %e, "virtual user task failed");
        }
        self.collector.set_vus(0);
    }
}

/// Forget workers that have already retired so their slots can be refilled
fn reap_finished(slots: &mut [Option<JoinHandle<()>>]) {
    for slot in slots.iter_mut() {
        if slot.as_ref().is_some_and(JoinHandle::is_finished) {
            *slot = None;
        }
    }
}

fn should_continue(id: u32, ctx: &WorkerContext) -> bool {
    *ctx.state.borrow() == RunState::Running && id < *ctx.target.borrow()
}

async fn run_worker(id: u32, ctx: Arc<WorkerContext>) {
    let mut state = ctx.state.clone();
    while should_continue(id, &ctx) {
        let sample = iterate(&ctx).await;
        ctx.collector.record(&sample);

        tokio::select! {
            () = tokio::time::sleep(ctx.pause) => {}
            () = wait_until_stopped(&mut state) => {}
        }
    }
    debug!(worker = id, "virtual user retired");
}

/// One iteration: build, send, classify
async fn iterate(ctx: &WorkerContext) -> RequestSample {
    let request = RequestBuilder::build(&ctx.template, ctx.token.as_deref());
    let bytes_sent = request.body.len() as u64;
    let started = Instant::now();
    let result = ctx.transport.send(&request).await;
    let latency = started.elapsed();
    let timestamp_ms = chrono::Utc::now().timestamp_millis();

    match result {
        Ok(response) => {
            if !ctx.first_response_logged.swap(true, Ordering::Relaxed) {
                let body = String::from_utf8_lossy(&response.body);
                let body: String = body.chars().take(FIRST_RESPONSE_LOG_LIMIT).collect();
                info!(status = response.status, body = %body, "first response");
            }
            RequestSample {
                timestamp_ms,
                status: response.status,
                latency,
                success: response.status == ctx.expected_status,
                error_kind: None,
                bytes_received: response.body.len() as u64,
                bytes_sent,
            }
        }
        Err(err) => {
            if !ctx.first_response_logged.swap(true, Ordering::Relaxed) {
                info!(error = %err, "first request failed");
            }
            debug!(error = %err, "request failed");
            RequestSample {
                timestamp_ms,
                status: 0,
                latency,
                success: false,
                error_kind: Some(err.kind),
                bytes_received: 0,
                bytes_sent,
            }
        }
    }
}

async fn wait_until_stopped(state: &mut watch::Receiver<RunState>) {
    loop {
        let running = *state.borrow_and_update() == RunState::Running;
        if !running || state.changed().await.is_err() {
            return;
        }
    }
}
