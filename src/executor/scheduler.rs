//! Scheduling facility for periodic maintenance jobs.
//!
//! Maintenance (inactivity sweep, metrics reporting) runs on its own
//! spawned tasks, isolated from the worker pool's queue so that request
//! load can never starve it. A failed run is logged and never cancels the
//! remaining schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinSet;

/// Outcome of one scheduled job run.
pub type JobResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Fixed-size scheduling facility for maintenance jobs.
pub struct Scheduler {
    tasks: std::sync::Mutex<JoinSet<()>>,
    shutting_down: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: std::sync::Mutex::new(JoinSet::new()),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Run `job` once after `delay`.
    pub fn schedule<F>(&self, name: &str, delay: Duration, job: F)
    where
        F: FnOnce() -> JobResult + Send + 'static,
    {
        if self.shutting_down.load(Ordering::SeqCst) {
            tracing::warn!(job = %name, "scheduler is shutting down; job not scheduled");
            return;
        }
        let name = name.to_string();
        self.tasks.lock().unwrap().spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = job() {
                tracing::warn!(job = %name, error = %e, "scheduled job failed");
            }
        });
    }

    /// Run `job` every `period`, first at `initial_delay`.
    ///
    /// A run that returns `Err` is logged and the schedule continues.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        name: &str,
        initial_delay: Duration,
        period: Duration,
        mut job: F,
    ) where
        F: FnMut() -> JobResult + Send + 'static,
    {
        if self.shutting_down.load(Ordering::SeqCst) {
            tracing::warn!(job = %name, "scheduler is shutting down; job not scheduled");
            return;
        }
        let name = name.to_string();
        self.tasks.lock().unwrap().spawn(async move {
            tokio::time::sleep(initial_delay).await;
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = job() {
                    tracing::warn!(job = %name, error = %e, "scheduled job failed; keeping schedule");
                }
            }
        });
    }

    /// Abort all scheduled jobs. Idempotent.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.tasks.lock().unwrap().abort_all();
        tracing::info!("scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
