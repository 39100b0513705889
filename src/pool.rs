//! Worker pool harness.
//!
//! Workers live in a dedicated rayon pool sized once per load. Every phase is
//! a `scope` that hands each worker its private payload; the end of the scope
//! is the barrier after which the driver may touch the batch again.

use std::time::{Duration, Instant};

use crate::error::LoadError;

/// Loads with a row cap at or below this size run on one worker.
pub const SMALL_LOAD_ROWS: u64 = 65_536;

/// What a worker does inside one [`WorkerPool::run_phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerPhase {
    Splitting,
    Converting,
}

/// A worker's private, round-reused state.
#[derive(Debug, Clone)]
pub(crate) struct WorkerTask {
    pub id: usize,
    /// Per-column conversion time of the current round.
    pub column_times: Vec<(usize, Duration)>,
    /// Accumulated busy time over the whole load.
    pub busy: Duration,
    /// Set when the worker gave up on the rest of its payload because the load
    /// is failing.
    pub stopped: bool,
}

impl WorkerTask {
    fn new(id: usize) -> Self {
        Self {
            id,
            column_times: Vec::new(),
            busy: Duration::ZERO,
            stopped: false,
        }
    }
}

/// Worker count for a load: `min(threads, cores, columns)`, at least 1, and
/// exactly 1 for small capped loads.
pub fn worker_count(threads: Option<usize>, columns: usize, max_rows: Option<u64>) -> usize {
    if max_rows.is_some_and(|m| m <= SMALL_LOAD_ROWS) {
        return 1;
    }
    let cores = num_cpus::get();
    threads.unwrap_or(cores).min(cores).min(columns).max(1)
}

pub(crate) struct WorkerPool {
    pool: rayon::ThreadPool,
    tasks: Vec<WorkerTask>,
}

impl WorkerPool {
    pub(crate) fn new(workers: usize) -> Result<Self, LoadError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("ironload-worker-{i}"))
            .build()
            .map_err(|e| LoadError::Pool(e.to_string()))?;
        Ok(Self {
            pool,
            tasks: (0..workers).map(WorkerTask::new).collect(),
        })
    }

    pub(crate) fn workers(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn tasks(&self) -> &[WorkerTask] {
        &self.tasks
    }

    /// Run `job` once per worker with that worker's payload and wait for all
    /// of them. Returns how many workers stopped early.
    pub(crate) fn run_phase<P, F>(&mut self, phase: WorkerPhase, payloads: Vec<P>, job: F) -> usize
    where
        P: Send,
        F: Fn(&mut WorkerTask, P) + Sync,
    {
        debug_assert_eq!(payloads.len(), self.tasks.len());
        let Self { pool, tasks } = self;
        let job = &job;
        pool.scope(|s| {
            for (task, payload) in tasks.iter_mut().zip(payloads) {
                task.stopped = false;
                s.spawn(move |_| {
                    let t0 = Instant::now();
                    job(task, payload);
                    task.busy += t0.elapsed();
                });
            }
        });
        let stopped = tasks.iter().filter(|t| t.stopped).count();
        if stopped > 0 {
            log::debug!("{phase:?}: {stopped} of {} workers stopped early", tasks.len());
        }
        stopped
    }

    /// Release the worker threads. They exit once the pool is dropped.
    pub(crate) fn shutdown(self) {
        log::debug!("shutting down worker pool of {}", self.tasks.len());
        drop(self.pool);
    }
}
