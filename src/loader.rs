//! The batch loop.
//!
//! A load runs in rounds. Each round takes one chunk of delimited records,
//! splits them on the worker pool by contiguous row ranges, asks the
//! [`WorkDivider`] for a column assignment and converts the columns on the
//! pool. A round only starts after the previous one fully drained, so rows
//! land in the columns in input order.
//!
//! After the conversion barrier a failing load rolls every column back to its
//! length at the start of the round, so no partial row is ever visible. In
//! collect mode the rows that failed to convert are compacted out of every
//! column instead.

use std::io::Write;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::batch::{Batch, CONVERT_ERROR, Field, SPLIT_ERROR};
use crate::column::ColumnDescriptor;
use crate::convert::{RoundView, convert_column};
use crate::cursor::ByteCursor;
use crate::divider::WorkDivider;
use crate::error::{Diagnostic, ErrorKind, LoadError};
#[cfg(feature = "metrics")]
use crate::metrics::LoadMetrics;
use crate::options::LoadOptions;
use crate::pool::{WorkerPhase, WorkerPool, worker_count};
use crate::prefetch::ChunkSource;
use crate::reader::RecordReader;
use crate::sink::{Disposition, ErrorSink};
use crate::splitter::{ColumnFormat, split_record};
use crate::tokenizer::RecordTokenizer;

/// Configured bulk load.
///
/// ```
/// use ironload::*;
///
/// let mut id = ColumnBuffer::<i32>::new();
/// let mut name = ColumnBuffer::<Option<String>>::new();
/// let mut columns = vec![
///     ColumnDescriptor::new("id", FromStrParser::<i32>::new("int"), &mut id),
///     ColumnDescriptor::new("name", TextParser, &mut name).with_null_marker("\\N"),
/// ];
/// let mut input = ReadCursor::from_bytes("1|\"a|b\"\n2|\\N\n");
///
/// let rows = Loader::new(LoadOptions::default().with_column_separator("|"))
///     .run(&mut columns, &mut input)
///     .unwrap();
/// drop(columns);
///
/// assert_eq!(rows, 2);
/// assert_eq!(id.values(), &[1, 2]);
/// assert_eq!(name.values(), &[Some("a|b".to_string()), None]);
/// assert!(name.has_nulls());
/// ```
pub struct Loader<'a> {
    options: LoadOptions,
    sink: Option<ErrorSink>,
    echo: Option<&'a mut (dyn Write + Send)>,
    #[cfg(feature = "metrics")]
    metrics: Option<LoadMetrics>,
}

impl<'a> Loader<'a> {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            sink: None,
            echo: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Route problems through `sink` instead of one built from
    /// [`LoadOptions::error_mode`].
    #[must_use]
    pub fn error_sink(mut self, sink: ErrorSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Write the continuation prompt to `echo` before every refill.
    #[must_use]
    pub fn echo(mut self, echo: &'a mut (dyn Write + Send)) -> Self {
        self.echo = Some(echo);
        self
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(mut self, metrics: LoadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Load `input` into `columns`, returning the number of rows appended.
    pub fn run(mut self, columns: &mut [ColumnDescriptor<'_>], input: &mut dyn ByteCursor) -> Result<u64, LoadError> {
        self.options.validate()?;
        if columns.is_empty() {
            return Err(LoadError::Config("no target columns".into()));
        }
        let opts = &self.options;
        let sink = self
            .sink
            .take()
            .unwrap_or_else(|| ErrorSink::with_mode(opts.error_mode, None));
        let format = column_formats(opts, columns)?;
        let tokenizer = RecordTokenizer::new(opts.record_separator.as_bytes(), opts.quote_byte(), opts.escape)?
            .with_columns(&format)?;

        let workers = worker_count(opts.threads, columns.len(), opts.max_rows);
        let pool = WorkerPool::new(workers)?;
        log::info!(
            "loading {} columns with {workers} workers (skip {}, max {:?})",
            columns.len(),
            opts.skip_rows,
            opts.max_rows
        );

        let echo = match self.echo.as_mut() {
            Some(w) => Some(&mut **w as &mut (dyn Write + Send)),
            None => None,
        };
        let reader = RecordReader::new(
            tokenizer,
            opts.skip_rows,
            opts.max_rows,
            opts.batch_rows,
            opts.buffer_size,
            opts.max_record_len,
        )
        .with_echo(echo);

        let mut driver = Driver {
            sink: &sink,
            names: columns.iter().map(|c| c.name().to_string()).collect(),
            divider: WorkDivider::new(columns.len(), workers, opts.rebalance_rounds),
            batch: Batch::new(format, opts.escape, workers),
            pool,
            #[cfg(feature = "metrics")]
            metrics: self.metrics.clone(),
        };
        #[cfg(feature = "metrics")]
        if let Some(m) = &driver.metrics {
            m.record_start(columns.len(), workers);
        }

        let result = if opts.prefetch {
            std::thread::scope(|s| {
                let source = ChunkSource::prefetch(s, reader, input)?;
                driver.drive(columns, source)
            })
        } else {
            driver.drive(columns, ChunkSource::inline(reader, input))
        };
        driver.finish();

        match &result {
            Ok(rows) => log::info!("load finished: {rows} rows"),
            Err(e) => log::error!("load failed: {e}"),
        }
        result
    }
}

/// Per-column delimiting rules. The last column always ends at the load's
/// column separator.
fn column_formats(opts: &LoadOptions, columns: &[ColumnDescriptor<'_>]) -> Result<Vec<ColumnFormat>, LoadError> {
    let last = columns.len() - 1;
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let separator = match c.separator() {
                Some("") => {
                    return Err(LoadError::Config(format!("column {}: empty separator", c.name())));
                }
                Some(sep) if i < last => sep.as_bytes().to_vec(),
                _ => opts.column_separator.as_bytes().to_vec(),
            };
            let quote = match c.quote() {
                Some(q) => Some(u8::try_from(q).map_err(|_| {
                    LoadError::Config(format!("column {}: quote {q:?} is not ASCII", c.name()))
                })?),
                None => opts.quote_byte(),
            };
            Ok(ColumnFormat {
                separator,
                quote,
                null_marker: c.null_marker().map(|m| m.as_bytes().to_vec()),
            })
        })
        .collect()
}

struct Driver<'s> {
    sink: &'s ErrorSink,
    names: Vec<String>,
    divider: WorkDivider,
    batch: Batch,
    pool: WorkerPool,
    #[cfg(feature = "metrics")]
    metrics: Option<LoadMetrics>,
}

struct SplitPayload<'f> {
    rows: std::ops::Range<usize>,
    fields: Vec<&'f mut [Field]>,
}

impl Driver<'_> {
    fn drive(&mut self, columns: &mut [ColumnDescriptor<'_>], mut source: ChunkSource<'_, '_>) -> Result<u64, LoadError> {
        let mut total = 0u64;
        while let Some(next) = source.next_chunk() {
            let mut chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.sink.report(Diagnostic::new(ErrorKind::Io, e.to_string()));
                    return Err(LoadError::Io(e));
                }
            };
            let finished = chunk.finished;
            let refills = chunk.refills;
            let dropped = chunk.diagnostics.len() as u64;
            for diag in chunk.diagnostics.drain(..) {
                if self.sink.report(diag) == Disposition::Stop {
                    break;
                }
            }

            self.batch.load_chunk(chunk);
            if !self.sink.is_fatal() && self.batch.row_count > 0 {
                total += self.round(columns, refills, dropped);
            }
            source.recycle(self.batch.take_chunk());

            if self.sink.is_fatal() || finished {
                break;
            }
        }

        match self.sink.first_error() {
            Some(diag) => Err(LoadError::Rejected(diag.clone())),
            None => Ok(total),
        }
    }

    /// Split, divide and convert the loaded chunk. Returns the rows appended.
    fn round(&mut self, columns: &mut [ColumnDescriptor<'_>], refills: u64, dropped: u64) -> u64 {
        let rows = self.batch.row_count;
        let base: Vec<usize> = columns.iter().map(|c| c.len()).collect();

        if self.split_phase() || self.sink.is_fatal() {
            return 0;
        }

        let assignment = self.divider.assign(&mut self.batch.col_time).to_vec();
        self.batch.assigned_to.copy_from_slice(&assignment);
        log::debug!("round: {rows} rows, columns -> workers {assignment:?}");

        if self.convert_phase(columns) || self.sink.is_fatal() {
            for (desc, len) in columns.iter_mut().zip(&base) {
                desc.sink.truncate(*len);
            }
            log::debug!("round rolled back to {base:?}");
            return 0;
        }

        let flags: Vec<u8> = self
            .batch
            .row_flags()
            .iter()
            .map(|f| f.load(Ordering::Acquire))
            .collect();
        let keep: Vec<bool> = flags
            .iter()
            .filter(|&&f| f & SPLIT_ERROR == 0)
            .map(|&f| f & CONVERT_ERROR == 0)
            .collect();
        if keep.contains(&false) {
            for (desc, start) in columns.iter_mut().zip(&base) {
                desc.sink.compact_from(*start, &keep);
            }
        }
        let appended = flags.iter().filter(|&&f| f == 0).count() as u64;

        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_round(rows as u64, appended, rows as u64 - appended + dropped, refills, &self.batch.col_time);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (refills, dropped);

        appended
    }

    /// Returns whether a worker stopped early.
    fn split_phase(&mut self) -> bool {
        let workers = self.pool.workers();
        let ranges = self.batch.row_ranges(workers);
        let Batch {
            chunk,
            fields,
            row_errors,
            format,
            escape,
            row_count,
            ..
        } = &mut self.batch;
        let flags = &row_errors[..*row_count];
        let (chunk, format, escape) = (&*chunk, &*format, *escape);
        let (sink, names) = (self.sink, &self.names);

        let mut payloads: Vec<SplitPayload<'_>> = ranges
            .iter()
            .map(|r| SplitPayload {
                rows: r.clone(),
                fields: Vec::with_capacity(fields.len()),
            })
            .collect();
        for col in fields.iter_mut() {
            let mut rest = col.as_mut_slice();
            for (payload, r) in payloads.iter_mut().zip(&ranges) {
                let (head, tail) = std::mem::take(&mut rest).split_at_mut(r.len());
                payload.fields.push(head);
                rest = tail;
            }
        }

        let stopped = self.pool.run_phase(WorkerPhase::Splitting, payloads, |task, mut p| {
            let mut row = vec![Field::Absent; format.len()];
            for (i, idx) in p.rows.clone().enumerate() {
                if sink.is_fatal() {
                    task.stopped = true;
                    break;
                }
                let rec = &chunk.records[idx];
                row.fill(Field::Absent);
                if let Err(e) = split_record(&chunk.data, rec.start, rec.end, format, escape, &mut row) {
                    flags[idx].fetch_or(SPLIT_ERROR, Ordering::AcqRel);
                    let col = e.column(format.len());
                    let diag = Diagnostic::new(ErrorKind::MalformedField, e.message(&chunk.data))
                        .at_line(rec.line)
                        .at_row(rec.row + 1)
                        .in_column(col, names[col].as_str())
                        .with_input(chunk.record_bytes(idx));
                    if sink.report(diag) == Disposition::Stop {
                        task.stopped = true;
                    }
                }
                for (col, field) in p.fields.iter_mut().zip(&row) {
                    col[i] = *field;
                }
            }
        });
        stopped > 0
    }

    /// Returns whether a worker stopped early.
    fn convert_phase(&mut self, columns: &mut [ColumnDescriptor<'_>]) -> bool {
        let Driver { sink, batch, pool, .. } = self;
        let sink: &ErrorSink = sink;

        let mut payloads: Vec<Vec<(usize, &mut ColumnDescriptor<'_>)>> =
            (0..pool.workers()).map(|_| Vec::new()).collect();
        for (col, desc) in columns.iter_mut().enumerate() {
            payloads[batch.assigned_to[col]].push((col, desc));
        }

        let view = RoundView {
            chunk: &batch.chunk,
            fields: &batch.fields,
            flags: &batch.row_errors[..batch.row_count],
            format: &batch.format,
            escape: batch.escape,
            sink,
        };
        let stopped = pool.run_phase(WorkerPhase::Converting, payloads, |task, assigned| {
            task.column_times.clear();
            for (col, desc) in assigned {
                if sink.is_fatal() {
                    task.stopped = true;
                    break;
                }
                let t0 = Instant::now();
                let ok = convert_column(&view, col, desc);
                task.column_times.push((col, t0.elapsed()));
                if !ok {
                    task.stopped = true;
                    break;
                }
            }
        });

        for task in pool.tasks() {
            for &(col, t) in &task.column_times {
                batch.col_time[col] += t;
            }
            batch.worker_time[task.id] = task.busy;
        }
        stopped > 0
    }

    fn finish(self) {
        self.sink.begin_shutdown();
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_end(&self.batch.worker_time, self.divider.rebalanced());
        }
        self.pool.shutdown();
    }
}

/// Load delimited text into `columns` with the classic argument list.
///
/// `quote == '\0'` disables quoting, a negative `skip_rows` skips nothing and
/// a negative `max_rows` loads everything. Problems abort the load.
#[allow(clippy::too_many_arguments)]
pub fn load(
    columns: &mut [ColumnDescriptor<'_>],
    input: &mut dyn ByteCursor,
    echo: Option<&mut (dyn Write + Send)>,
    col_sep: &str,
    rec_sep: &str,
    quote: char,
    skip_rows: i64,
    max_rows: i64,
) -> Result<u64, LoadError> {
    let options = LoadOptions::default()
        .with_column_separator(col_sep)
        .with_record_separator(rec_sep)
        .with_quote((quote != '\0').then_some(quote))
        .with_skip_rows(u64::try_from(skip_rows).unwrap_or(0))
        .with_max_rows(u64::try_from(max_rows).ok());
    let loader = Loader::new(options);
    match echo {
        Some(echo) => loader.echo(echo).run(columns, input),
        None => loader.run(columns, input),
    }
}
