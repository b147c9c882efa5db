//! Output formatting and progress reporting

use barrage::{MetricsCollector, RunState};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often the progress bar refreshes
const REFRESH: Duration = Duration::from_millis(250);

/// Progress and status lines on stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    ticker: Option<JoinHandle<()>>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            ticker: None,
            use_color,
            quiet,
        }
    }

    /// Follow a run: elapsed seconds against the planned duration, plus the live request count.
    ///
    /// The bar clears itself once the scheduler leaves `Running`.
    pub fn follow(
        &mut self,
        label: &str,
        planned: Duration,
        collector: Arc<MetricsCollector>,
        mut state: watch::Receiver<RunState>,
    ) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(planned.as_secs().max(1));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len}s {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_prefix(label.to_string());

        let started = tokio::time::Instant::now();
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(REFRESH);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        pb.set_position(started.elapsed().as_secs());
                        pb.set_message(format!("{} requests", collector.request_count()));
                    }
                    changed = state.changed() => {
                        let running = changed.is_ok()
                            && matches!(*state.borrow(), RunState::Idle | RunState::Running);
                        if !running {
                            break;
                        }
                    }
                }
            }
            pb.finish_and_clear();
        }));
    }

    /// Stop following, clearing the bar if it is still drawn
    pub async fn finish(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            let _ = ticker.await;
        }
    }

    /// Print a section header
    pub fn header(&self, message: &str) {
        if self.quiet {
            return;
        }
        let line = "=".repeat(57);
        let message = if self.use_color {
            style(message).bold().to_string()
        } else {
            message.to_string()
        };
        let _ = self.term.write_line(&format!("\n{line}\n  {message}\n{line}\n"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "PASS".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "FAIL".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };

        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let _ = self.term.write_line(message);
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}
