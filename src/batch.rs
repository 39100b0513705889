//! Per-round working state.

use std::ops::Range;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::splitter::ColumnFormat;

/// Row flag: the record did not split into the expected fields.
pub(crate) const SPLIT_ERROR: u8 = 1;
/// Row flag: at least one field failed to convert.
pub(crate) const CONVERT_ERROR: u8 = 2;

/// Location of one record inside [`RecordChunk::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordRef {
    pub start: usize,
    pub end: usize,
    /// 1-based input line where the record starts.
    pub line: u64,
    /// 0-based ordinal among the records handed to the loader.
    pub row: u64,
}

/// One round's worth of delimited records, copied out of the cursor.
#[derive(Debug, Default)]
pub(crate) struct RecordChunk {
    pub data: Vec<u8>,
    pub records: Vec<RecordRef>,
    /// Problems found while delimiting, reported when the chunk is processed.
    pub diagnostics: Vec<crate::error::Diagnostic>,
    /// No chunk follows this one.
    pub finished: bool,
    /// Cursor refills performed while filling this chunk.
    pub refills: u64,
}

impl RecordChunk {
    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.records.clear();
        self.diagnostics.clear();
        self.finished = false;
        self.refills = 0;
    }

    pub(crate) fn record_bytes(&self, row: usize) -> &[u8] {
        let r = &self.records[row];
        &self.data[r.start..r.end]
    }
}

/// A field span inside [`RecordChunk::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Field {
    /// Not produced (the record failed to split before this column).
    #[default]
    Absent,
    /// Matched the column's null marker.
    Null,
    Text { start: usize, end: usize, quoted: bool },
}

/// The unit of work of one round.
///
/// The field table is laid out `fields[col][row]`; `row_capacity` grows
/// geometrically and never shrinks.
pub(crate) struct Batch {
    pub chunk: RecordChunk,
    pub row_count: usize,
    pub row_capacity: usize,
    pub fields: Vec<Vec<Field>>,
    pub row_errors: Vec<AtomicU8>,
    pub format: Vec<ColumnFormat>,
    pub escape: bool,
    pub assigned_to: Vec<usize>,
    pub col_time: Vec<Duration>,
    pub worker_time: Vec<Duration>,
}

impl Batch {
    pub(crate) fn new(format: Vec<ColumnFormat>, escape: bool, workers: usize) -> Self {
        let columns = format.len();
        Self {
            chunk: RecordChunk::default(),
            row_count: 0,
            row_capacity: 0,
            fields: vec![Vec::new(); columns],
            row_errors: Vec::new(),
            format,
            escape,
            assigned_to: vec![0; columns],
            col_time: vec![Duration::ZERO; columns],
            worker_time: vec![Duration::ZERO; workers],
        }
    }

    /// Install the next chunk and reset the field table for its rows.
    pub(crate) fn load_chunk(&mut self, chunk: RecordChunk) {
        self.chunk = chunk;
        self.row_count = self.chunk.records.len();
        if self.row_count > self.row_capacity {
            let mut cap = self.row_capacity.max(1024);
            while cap < self.row_count {
                cap = cap.saturating_mul(2);
            }
            log::trace!("field table grows from {} to {cap} rows", self.row_capacity);
            self.row_capacity = cap;
            self.row_errors.resize_with(cap, || AtomicU8::new(0));
        }
        for col in &mut self.fields {
            col.clear();
            col.resize(self.row_count, Field::Absent);
        }
        for flag in &self.row_errors[..self.row_count] {
            flag.store(0, Ordering::Relaxed);
        }
    }

    /// Remove the processed chunk so its buffers can be reused.
    pub(crate) fn take_chunk(&mut self) -> RecordChunk {
        self.row_count = 0;
        std::mem::take(&mut self.chunk)
    }

    /// Contiguous, disjoint row ranges, one per worker (possibly empty).
    pub(crate) fn row_ranges(&self, workers: usize) -> Vec<Range<usize>> {
        let piece = self.row_count.div_ceil(workers.max(1));
        (0..workers)
            .map(|w| {
                let start = (w * piece).min(self.row_count);
                let end = (start + piece).min(self.row_count);
                start..end
            })
            .collect()
    }

    pub(crate) fn row_flags(&self) -> &[AtomicU8] {
        &self.row_errors[..self.row_count]
    }
}
