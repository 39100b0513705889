//! Error routing for bulk loads.
//!
//! A load runs in one of two [`ErrorMode`]s:
//! - **Abort** - the first problem is latched and the load stops after the
//!   current round; the caller receives that diagnostic.
//! - **Collect** - every problem is appended to a [`Rejects`] table, the
//!   offending row is dropped and loading continues.
//!
//! Resource and I/O problems always stop the load, whatever the mode.
//!
//! # Example
//!
//! ```no_run
//! use ironload::*;
//! use std::sync::{Arc, Mutex};
//!
//! # fn main() -> anyhow::Result<()> {
//! let rejects = Arc::new(Mutex::new(Rejects::new()));
//! let sink = ErrorSink::collect_into(Arc::clone(&rejects));
//!
//! let mut ids = ColumnBuffer::<i64>::new();
//! let mut columns = vec![ColumnDescriptor::new("id", FromStrParser::<i64>::new("int"), &mut ids)];
//! let mut input = ReadCursor::from_bytes(b"1\nx\n3\n".to_vec());
//!
//! let rows = Loader::new(LoadOptions::default())
//!     .error_sink(sink)
//!     .run(&mut columns, &mut input)?;
//! assert_eq!(rows, 2);
//! assert_eq!(rejects.lock().unwrap().len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::error::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Defines how per-row problems affect a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// Stop on the first problem.
    #[default]
    Abort,
    /// Record every problem, drop the offending rows and continue.
    Collect,
}

/// What the reporter of a diagnostic should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Drop the offending row and keep going.
    Skip,
    /// The load is failing; stop the current unit of work.
    Stop,
}

/// Append-only table of every diagnostic reported during a load.
#[derive(Debug, Clone, Default)]
pub struct Rejects {
    entries: Vec<Diagnostic>,
}

impl Rejects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Print all entries to stderr.
    pub fn print(&self) {
        for d in &self.entries {
            eprintln!("{d}");
        }
    }

    /// Export entries to JSON format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Write entries to a file in JSON format.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let json = self.to_json().map_err(io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Write entries as CSV with the columns
    /// `line,row,column,column_name,kind,message,input`.
    #[cfg(feature = "rejects-csv")]
    pub fn write_csv<W: io::Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(["line", "row", "column", "column_name", "kind", "message", "input"])?;
        for d in &self.entries {
            let kind = serde_json::to_value(d.kind)?;
            wtr.write_record([
                d.line.map(|v| v.to_string()).unwrap_or_default(),
                d.row.map(|v| v.to_string()).unwrap_or_default(),
                d.column.map(|v| (v + 1).to_string()).unwrap_or_default(),
                d.column_name.clone().unwrap_or_default(),
                kind.as_str().unwrap_or_default().to_string(),
                d.message.clone(),
                d.input.clone().unwrap_or_default(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl fmt::Display for Rejects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rejects({} entries)", self.len())
    }
}

/// Shared error state of one load.
///
/// The first fatal diagnostic is latched in a write-once cell; later ones are
/// discarded. The rejects table sits behind a mutex that is only taken on the
/// error path.
#[derive(Debug)]
pub struct ErrorSink {
    mode: ErrorMode,
    first: OnceLock<Diagnostic>,
    fatal: AtomicBool,
    shutting_down: AtomicBool,
    reported: AtomicUsize,
    rejects: Option<Arc<Mutex<Rejects>>>,
}

impl ErrorSink {
    /// Stop on the first problem.
    pub fn abort() -> Self {
        Self::with_mode(ErrorMode::Abort, None)
    }

    /// Collect problems into a private rejects table (see [`ErrorSink::rejects`]).
    pub fn collect() -> Self {
        Self::collect_into(Arc::new(Mutex::new(Rejects::new())))
    }

    /// Collect problems into a caller-owned rejects table.
    pub fn collect_into(rejects: Arc<Mutex<Rejects>>) -> Self {
        Self::with_mode(ErrorMode::Collect, Some(rejects))
    }

    /// Build a sink for `mode`. An abort sink may still be given a rejects
    /// table, in which case the diagnostics that stopped the load are recorded
    /// there too.
    pub fn with_mode(mode: ErrorMode, rejects: Option<Arc<Mutex<Rejects>>>) -> Self {
        let rejects = match (mode, rejects) {
            (ErrorMode::Collect, None) => Some(Arc::new(Mutex::new(Rejects::new()))),
            (_, r) => r,
        };
        Self {
            mode,
            first: OnceLock::new(),
            fatal: AtomicBool::new(false),
            shutting_down: AtomicBool::new(false),
            reported: AtomicUsize::new(0),
            rejects,
        }
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    /// The rejects table, when one is attached.
    pub fn rejects(&self) -> Option<Arc<Mutex<Rejects>>> {
        self.rejects.clone()
    }

    /// Whether a fatal problem has been latched.
    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }

    /// The first fatal diagnostic, if any.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.first.get()
    }

    /// Number of diagnostics accepted so far (swallowed ones excluded).
    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::Relaxed)
    }

    /// Route one diagnostic.
    pub(crate) fn report(&self, diagnostic: Diagnostic) -> Disposition {
        if self.shutting_down.load(Ordering::Acquire) {
            log::debug!("swallowed diagnostic after shutdown: {diagnostic}");
            return Disposition::Stop;
        }
        self.reported.fetch_add(1, Ordering::Relaxed);

        let fatal = self.mode == ErrorMode::Abort || diagnostic.kind.is_always_fatal();
        if fatal {
            log::error!("load failed: {diagnostic}");
        } else {
            log::warn!("rejected row: {diagnostic}");
        }

        if let Some(rejects) = &self.rejects {
            let mut table = rejects.lock().unwrap_or_else(PoisonError::into_inner);
            table.push(diagnostic.clone());
        }

        if fatal {
            let _ = self.first.set(diagnostic);
            self.fatal.store(true, Ordering::Release);
            Disposition::Stop
        } else {
            Disposition::Skip
        }
    }

    /// Mark the load as shutting down; later reports are dropped.
    pub(crate) fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::abort()
    }
}
