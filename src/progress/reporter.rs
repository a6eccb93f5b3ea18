//! Progress reporter implementation
//!
//! Uses indicatif to render a file-count bar. The reporter never sits on the
//! hashing path: an observer task polls the shared completion counter on a
//! fixed interval and draws whatever it reads.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::info;

/// How often the observer samples the completion counter
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Progress reporter for digest runs
pub struct ProgressReporter {
    /// File count progress bar
    files_bar: ProgressBar,
    /// Start time
    start_time: Instant,
    /// Total files to hash
    total_files: AtomicU64,
    /// Files hashed as of the last poll
    files_seen: AtomicU64,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let files_bar = ProgressBar::new(0);
        files_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%, ETA {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        files_bar.set_prefix("Hashing");

        Self {
            files_bar,
            start_time: Instant::now(),
            total_files: AtomicU64::new(0),
            files_seen: AtomicU64::new(0),
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.files_bar.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Set total files to hash
    pub fn set_total_files(&self, total: u64) {
        self.total_files.store(total, Ordering::Relaxed);
        self.files_bar.set_length(total);
    }

    /// Record the latest value of the completion counter
    pub fn update(&self, completed: u64) {
        self.files_seen.fetch_max(completed, Ordering::Relaxed);
        self.files_bar.set_position(completed);
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Finish progress with success message
    pub fn finish_success(&self) {
        self.files_bar.finish();
    }

    /// Stop drawing after a cancelled or failed run
    pub fn finish_error(&self, message: &str) {
        self.files_bar.abandon_with_message(message.to_string());
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_files: self.total_files.load(Ordering::Relaxed),
            files_hashed: self.files_seen.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }

    /// Spawn the observer task.
    ///
    /// It polls `completed` every [`POLL_INTERVAL`] and exits once the counter
    /// reaches the total or `cancelled` is raised.
    pub fn observe(
        self: Arc<Self>,
        completed: Arc<AtomicU64>,
        cancelled: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let total = self.total_files.load(Ordering::Relaxed);
            let mut ticker = tokio::time::interval(POLL_INTERVAL);

            loop {
                ticker.tick().await;
                let current = completed.load(Ordering::Relaxed);
                self.update(current);

                if cancelled.load(Ordering::SeqCst) {
                    info!("Progress reporting stopped by cancellation");
                    self.finish_error("cancelled");
                    return;
                }
                if current >= total {
                    self.finish_success();
                    return;
                }
            }
        })
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress summary
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Total files to hash
    pub total_files: u64,
    /// Files hashed so far
    pub files_hashed: u64,
    /// Elapsed time
    pub elapsed: Duration,
}

impl ProgressSummary {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total_files == 0 {
            100.0
        } else {
            (self.files_hashed as f64 / self.total_files as f64) * 100.0
        }
    }
}
