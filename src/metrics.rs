//! Load statistics.
//!
//! A [`LoadMetrics`] handle is cheap to clone; give one to
//! [`Loader::metrics`](crate::Loader::metrics), run the load, then read,
//! print or save the numbers.
//!
//! # Example
//!
//! ```no_run
//! use ironload::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = LoadMetrics::new();
//! let mut ids = ColumnBuffer::<i64>::new();
//! let mut columns = vec![ColumnDescriptor::new("id", FromStrParser::<i64>::new("int"), &mut ids)];
//! let mut input = ReadCursor::open("ids.csv.gz")?;
//!
//! Loader::new(LoadOptions::default())
//!     .metrics(metrics.clone())
//!     .run(&mut columns, &mut input)?;
//!
//! metrics.print();
//! metrics.save_to_file("load-metrics.json")?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Point-in-time copy of the collected numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub rounds: u64,
    pub rows_appended: u64,
    pub rows_rejected: u64,
    pub refills: u64,
    pub workers: usize,
    pub rebalance_rounds: usize,
    /// Records delimited in each round.
    pub round_rows: Vec<u64>,
    /// Cumulative conversion time per column, in microseconds.
    pub column_time_us: Vec<u64>,
    /// Cumulative busy time per worker, in microseconds.
    pub worker_busy_us: Vec<u64>,
    pub elapsed_ms: Option<u64>,
}

#[derive(Default)]
struct Inner {
    snap: MetricsSnapshot,
    column_time: Vec<Duration>,
    start: Option<Instant>,
    end: Option<Instant>,
}

/// Thread-safe collector of load statistics.
#[derive(Clone, Default)]
pub struct LoadMetrics {
    inner: Arc<Mutex<Inner>>,
}

impl LoadMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_start(&self, columns: usize, workers: usize) {
        let mut inner = self.lock();
        inner.start = Some(Instant::now());
        inner.end = None;
        inner.column_time = vec![Duration::ZERO; columns];
        inner.snap = MetricsSnapshot {
            workers,
            ..MetricsSnapshot::default()
        };
    }

    pub(crate) fn record_round(&self, rows: u64, appended: u64, rejected: u64, refills: u64, col_time: &[Duration]) {
        let mut inner = self.lock();
        inner.snap.rounds += 1;
        inner.snap.round_rows.push(rows);
        inner.snap.rows_appended += appended;
        inner.snap.rows_rejected += rejected;
        inner.snap.refills += refills;
        if inner.column_time.len() < col_time.len() {
            inner.column_time.resize(col_time.len(), Duration::ZERO);
        }
        for (acc, t) in inner.column_time.iter_mut().zip(col_time) {
            *acc += *t;
        }
    }

    pub(crate) fn record_end(&self, worker_busy: &[Duration], rebalance_rounds: usize) {
        let mut inner = self.lock();
        inner.end = Some(Instant::now());
        inner.snap.worker_busy_us = worker_busy.iter().map(|d| micros(*d)).collect();
        inner.snap.rebalance_rounds = rebalance_rounds;
    }

    /// Wall-clock time of the last finished load.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.start, inner.end) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let elapsed = self.elapsed();
        let inner = self.lock();
        let mut snap = inner.snap.clone();
        snap.column_time_us = inner.column_time.iter().map(|d| micros(*d)).collect();
        snap.elapsed_ms = elapsed.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        snap
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        let s = self.snapshot();
        println!("\n========== Load Metrics ==========");
        if let Some(ms) = s.elapsed_ms {
            println!("Elapsed: {ms} ms");
            println!("----------------------------------");
        }
        println!("rounds: {}", s.rounds);
        println!("rows_appended: {}", s.rows_appended);
        println!("rows_rejected: {}", s.rows_rejected);
        println!("refills: {}", s.refills);
        println!("workers: {} (rebalanced {} rounds)", s.workers, s.rebalance_rounds);
        println!("column_time_us: {:?}", s.column_time_us);
        println!("worker_busy_us: {:?}", s.worker_busy_us);
        println!("==================================\n");
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        let formatted = serde_json::to_string_pretty(&self.snapshot())?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}

fn micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_accumulate() {
        let m = LoadMetrics::new();
        m.record_start(2, 2);
        m.record_round(10, 9, 1, 1, &[Duration::from_micros(5), Duration::from_micros(7)]);
        m.record_round(4, 4, 0, 2, &[Duration::from_micros(5), Duration::ZERO]);
        m.record_end(&[Duration::from_micros(3)], 2);

        let s = m.snapshot();
        assert_eq!(s.rounds, 2);
        assert_eq!(s.round_rows, [10, 4]);
        assert_eq!(s.rows_appended, 13);
        assert_eq!(s.refills, 3);
        assert_eq!(s.column_time_us, [10, 7]);
        assert!(s.elapsed_ms.is_some());
        assert_eq!(m.to_json()["rows_rejected"], 1);
    }
}
