//! # Ironload
//!
//! A **parallel bulk loader** for delimited text. Ironload reads records from
//! a byte stream, splits them into fields and converts each field into a typed
//! column buffer, using a pool of worker threads for both steps.
//!
//! ## Key Features
//!
//! - **Multi-byte separators** - column and record separators of any length,
//!   matched with a precomputed automaton
//! - **Quoting and escapes** - quoted fields may contain separators; doubled
//!   quotes and backslash escapes are decoded
//! - **Order preserving** - rows land in the columns in input order no matter
//!   how many workers run
//! - **Adaptive work division** - columns are reassigned to workers from
//!   measured conversion times until the assignment settles
//! - **Read-ahead** - the next chunk of records is read while the current one
//!   is converted
//! - **Two error modes** - stop at the first problem, or collect rejected rows
//!   and keep going
//! - **Compressed inputs** - gzip, zstd, bzip2 and xz (optional via feature
//!   flags)
//!
//! ## Quick Start
//!
//! ```
//! use ironload::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let mut ids = ColumnBuffer::<i64>::new();
//! let mut prices = ColumnBuffer::<f64>::new();
//! let mut notes = ColumnBuffer::<Option<String>>::new();
//!
//! let mut columns = vec![
//!     ColumnDescriptor::new("id", FromStrParser::<i64>::new("bigint"), &mut ids),
//!     ColumnDescriptor::new("price", FromStrParser::<f64>::new("double"), &mut prices),
//!     ColumnDescriptor::new("note", TextParser, &mut notes).with_null_marker("NULL"),
//! ];
//!
//! let mut input = ReadCursor::from_bytes("1,2.5,\"cheap, really\"\n2,10,NULL\n");
//! let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut input)?;
//! drop(columns);
//!
//! assert_eq!(rows, 2);
//! assert_eq!(ids.values(), &[1, 2]);
//! assert_eq!(notes.get(1), Some(&None));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Columns
//!
//! A [`ColumnBuffer<T>`] is an append-only typed vector owned by the caller.
//! A [`ColumnDescriptor`] borrows one for the duration of a load and pairs it
//! with a [`ValueParser`] and the column's format overrides (null marker,
//! separator, quote). Failed conversions append the buffer's null value.
//!
//! ### Inputs
//!
//! Any [`ByteCursor`] can feed a load. [`ReadCursor`] wraps a [`std::io::Read`]
//! and [`ReadCursor::open`] opens a file, decompressing it by extension or
//! magic bytes.
//!
//! ### Rounds
//!
//! A load proceeds in rounds: one chunk of records is split by row ranges on
//! the pool, then converted column by column on the pool. A round finishes
//! before the next one starts; see [`divider`] for how columns are assigned.
//!
//! ### Errors
//!
//! Every problem becomes a [`Diagnostic`] reported to the load's
//! [`ErrorSink`]. In [`ErrorMode::Abort`] the first one ends the load with
//! [`LoadError::Rejected`] and the round in flight is rolled back. In
//! [`ErrorMode::Collect`] bad rows are left out and recorded in a [`Rejects`]
//! table.
//!
//! ```
//! use ironload::*;
//! use std::sync::{Arc, Mutex};
//!
//! let rejects = Arc::new(Mutex::new(Rejects::new()));
//! let mut n = ColumnBuffer::<u8>::new();
//! let mut columns = vec![ColumnDescriptor::new("n", FromStrParser::<u8>::new("tinyint"), &mut n)];
//!
//! let rows = Loader::new(LoadOptions::default())
//!     .error_sink(ErrorSink::collect_into(rejects.clone()))
//!     .run(&mut columns, &mut ReadCursor::from_bytes("1\n300\n3\n"))
//!     .unwrap();
//! drop(columns);
//!
//! assert_eq!(rows, 2);
//! assert_eq!(n.values(), &[1, 3]);
//! assert_eq!(rejects.lock().unwrap().len(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `rejects-csv` - write the rejects table as CSV
//! - `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//!   `compression-xz` - transparent input decompression
//! - `metrics` - per-load round, row and timing counters
//!
//! All are enabled by default.

mod batch;
pub mod column;
mod convert;
pub mod cursor;
pub mod divider;
pub mod error;
pub mod io;
pub mod loader;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod options;
mod pool;
mod prefetch;
mod reader;
pub mod sink;
mod splitter;
pub mod testing;
mod tokenizer;

// Re-export commonly used types
pub use column::{
    AppendProbe, BoolParser, ColumnBuffer, ColumnDescriptor, FnParser, FromStrParser, NullValue, TextParser,
    ValueParser, parser_fn,
};
pub use cursor::{ByteCursor, DEFAULT_CAPACITY, ReadCursor};
pub use divider::{DEFAULT_REBALANCE_ROUNDS, WorkDivider};
pub use error::{Diagnostic, ErrorKind, LoadError, escape_invalid_utf8};
pub use loader::{Loader, load};
pub use options::{DEFAULT_MAX_RECORD_LEN, LoadOptions};
pub use pool::{SMALL_LOAD_ROWS, worker_count};
pub use reader::ECHO_PROMPT;
pub use sink::{ErrorMode, ErrorSink, Rejects};

#[cfg(feature = "metrics")]
pub use metrics::{LoadMetrics, MetricsSnapshot};
