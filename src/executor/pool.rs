//! Bounded-concurrency worker pool for connection-handling tasks.
//!
//! The pool mirrors a classic core/max thread pool: `core_size` resident
//! workers drain a bounded queue; when the queue is full, up to
//! `max_size - core_size` burst workers are spawned and linger for
//! `keep_alive` before retiring. When the queue is full *and* the pool is
//! at maximum size, the admission policy runs the task on the caller's own
//! execution context, so callers slow down under load instead of losing
//! work.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::timeout;

use super::error::PoolError;

/// Boxed unit of work executed by the pool.
type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of resident workers.
    pub core_size: usize,
    /// Upper bound on concurrent workers (core + burst).
    pub max_size: usize,
    /// Capacity of the bounded task queue.
    pub queue_capacity: usize,
    /// How long a burst worker lingers idle before retiring.
    pub keep_alive: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_size: 10,
            max_size: 50,
            queue_capacity: 100,
            keep_alive: Duration::from_secs(60),
        }
    }
}

/// Point-in-time snapshot of the pool. Never blocks, never mutates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub pool_size: usize,
    pub active_count: usize,
    pub completed_count: u64,
    pub queue_size: usize,
    pub queue_remaining_capacity: usize,
}

/// Counters and the shared queue receiver, visible to every worker.
struct PoolShared {
    queue_rx: AsyncMutex<mpsc::Receiver<Job>>,
    queued: AtomicUsize,
    workers: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
}

impl PoolShared {
    async fn run(&self, job: Job) {
        self.active.fetch_add(1, Ordering::SeqCst);
        job.await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Pull the next queued job. Returns `None` once the queue is closed
    /// and drained.
    async fn next_job(&self) -> Option<Job> {
        let job = self.queue_rx.lock().await.recv().await;
        if job.is_some() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
        }
        job
    }
}

async fn core_worker(shared: Arc<PoolShared>) {
    while let Some(job) = shared.next_job().await {
        shared.run(job).await;
    }
    shared.workers.fetch_sub(1, Ordering::SeqCst);
}

async fn burst_worker(
    shared: Arc<PoolShared>,
    first_job: Job,
    keep_alive: Duration,
    _permit: OwnedSemaphorePermit,
) {
    shared.run(first_job).await;
    // Keep draining until idle for keep_alive, then retire.
    while let Ok(Some(job)) = timeout(keep_alive, shared.next_job()).await {
        shared.run(job).await;
    }
    shared.workers.fetch_sub(1, Ordering::SeqCst);
}

/// Bounded-concurrency task executor. Shared process-wide for the lifetime
/// of the server.
pub struct WorkerPool {
    config: PoolConfig,
    shared: Arc<PoolShared>,
    /// Taken on shutdown so workers observe a closed queue.
    queue_tx: std::sync::Mutex<Option<mpsc::Sender<Job>>>,
    burst_permits: Arc<Semaphore>,
    tasks: std::sync::Mutex<JoinSet<()>>,
    shutting_down: AtomicBool,
}

impl WorkerPool {
    /// Create the pool and spawn its core workers. Must be called from
    /// within a tokio runtime.
    pub fn new(config: PoolConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let shared = Arc::new(PoolShared {
            queue_rx: AsyncMutex::new(queue_rx),
            queued: AtomicUsize::new(0),
            workers: AtomicUsize::new(config.core_size),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
        });

        let mut tasks = JoinSet::new();
        for _ in 0..config.core_size {
            tasks.spawn(core_worker(Arc::clone(&shared)));
        }

        let burst_permits = Arc::new(Semaphore::new(
            config.max_size.saturating_sub(config.core_size),
        ));

        tracing::info!(
            core = config.core_size,
            max = config.max_size,
            queue = config.queue_capacity,
            "worker pool initialized"
        );

        Self {
            config,
            shared,
            queue_tx: std::sync::Mutex::new(Some(queue_tx)),
            burst_permits,
            tasks: std::sync::Mutex::new(tasks),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Submit a task for execution.
    ///
    /// Admission ladder:
    /// 1. enqueue onto the bounded queue;
    /// 2. queue full: spawn a burst worker if the pool is below `max_size`;
    /// 3. pool saturated: run the task on the caller, the explicit
    ///    synchronous-fallback branch. The submitter provides the
    ///    backpressure by awaiting the task itself.
    pub async fn execute<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }

        let mut job: Job = Box::pin(task);

        {
            let tx_guard = self.queue_tx.lock().unwrap();
            let Some(tx) = tx_guard.as_ref() else {
                return Err(PoolError::ShuttingDown);
            };
            self.shared.queued.fetch_add(1, Ordering::SeqCst);
            match tx.try_send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::TrySendError::Full(returned)) => {
                    self.shared.queued.fetch_sub(1, Ordering::SeqCst);
                    job = returned;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.shared.queued.fetch_sub(1, Ordering::SeqCst);
                    return Err(PoolError::ShuttingDown);
                }
            }
        }

        match Arc::clone(&self.burst_permits).try_acquire_owned() {
            Ok(permit) => {
                self.shared.workers.fetch_add(1, Ordering::SeqCst);
                let shared = Arc::clone(&self.shared);
                let keep_alive = self.config.keep_alive;
                self.tasks
                    .lock()
                    .unwrap()
                    .spawn(burst_worker(shared, job, keep_alive, permit));
                Ok(())
            }
            Err(_) => {
                tracing::debug!("queue full and pool saturated; running task on the caller");
                self.shared.run(job).await;
                Ok(())
            }
        }
    }

    /// Point-in-time pool statistics.
    pub fn stats(&self) -> PoolStats {
        let queue_size = self.shared.queued.load(Ordering::SeqCst);
        PoolStats {
            pool_size: self.shared.workers.load(Ordering::SeqCst),
            active_count: self.shared.active.load(Ordering::SeqCst),
            completed_count: self.shared.completed.load(Ordering::SeqCst),
            queue_size,
            queue_remaining_capacity: self.config.queue_capacity.saturating_sub(queue_size),
        }
    }

    /// Whether a submission right now would avoid the caller-runs branch.
    pub fn can_accept_more_tasks(&self) -> bool {
        let stats = self.stats();
        stats.queue_remaining_capacity > 0 || stats.pool_size < self.config.max_size
    }

    /// Graceful shutdown: stop accepting work, wait up to `grace` for
    /// in-flight and queued tasks to finish, then force-cancel stragglers.
    ///
    /// Idempotent; later calls return immediately.
    pub async fn shutdown(&self, grace: Duration) -> Result<(), PoolError> {
        if self.shutting_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("worker pool shutdown started");

        // Closing the queue lets workers drain what is left and exit.
        self.queue_tx.lock().unwrap().take();

        let deadline = tokio::time::Instant::now() + grace;
        loop {
            let stats = self.stats();
            if stats.active_count == 0 && stats.queue_size == 0 {
                tracing::info!("worker pool shut down cleanly");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    active = stats.active_count,
                    queued = stats.queue_size,
                    "worker pool did not drain within the grace period; forcing cancellation"
                );
                self.tasks.lock().unwrap().abort_all();
                return Err(PoolError::ShutdownTimeout(grace));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
