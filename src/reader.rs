//! Fills [`RecordChunk`]s from a [`ByteCursor`].
//!
//! This is the only code that touches the cursor. It applies the skip count
//! and the row cap, validates record encoding, enforces the record length
//! limit and writes the echo prompt before every refill.

use std::io::{self, Write};

use crate::batch::{RecordChunk, RecordRef};
use crate::cursor::ByteCursor;
use crate::error::{Diagnostic, ErrorKind};
use crate::tokenizer::{RecordTokenizer, Scan};

/// Prompt asking an interactive client for more input.
pub const ECHO_PROMPT: &[u8] = b"\x01\x02\n";

pub(crate) struct RecordReader<'e> {
    tokenizer: RecordTokenizer,
    skip_remaining: u64,
    /// Records still accepted under the row cap.
    remaining: Option<u64>,
    next_row: u64,
    line: u64,
    batch_rows: usize,
    buffer_size: usize,
    max_record_len: usize,
    echo: Option<&'e mut (dyn Write + Send)>,
    done: bool,
}

impl<'e> RecordReader<'e> {
    pub(crate) fn new(
        tokenizer: RecordTokenizer,
        skip_rows: u64,
        max_rows: Option<u64>,
        batch_rows: Option<usize>,
        buffer_size: usize,
        max_record_len: usize,
    ) -> Self {
        Self {
            tokenizer,
            skip_remaining: skip_rows,
            remaining: max_rows,
            next_row: 0,
            line: 1,
            batch_rows: batch_rows.unwrap_or(usize::MAX).max(1),
            buffer_size: buffer_size.max(1),
            max_record_len,
            echo: None,
            done: false,
        }
    }

    #[must_use]
    pub(crate) fn with_echo(mut self, echo: Option<&'e mut (dyn Write + Send)>) -> Self {
        self.echo = echo;
        self
    }

    /// Refill `chunk` with the next round's records.
    ///
    /// Returns once at least one record was taken and no further complete
    /// record is in the window, the per-round cap is hit, or the input ends.
    pub(crate) fn fill_chunk(
        &mut self,
        cursor: &mut dyn ByteCursor,
        chunk: &mut RecordChunk,
    ) -> io::Result<()> {
        chunk.clear();
        loop {
            if self.remaining == Some(0) {
                self.done = true;
            }
            if self.done {
                chunk.finished = true;
                return Ok(());
            }

            let (consumed, want_more) = self.take_records(cursor, chunk);
            cursor.consume(consumed);

            if self.done || !want_more || !chunk.records.is_empty() {
                chunk.finished = self.done || self.remaining == Some(0);
                return Ok(());
            }

            let pending = cursor.window().len();
            if pending > self.max_record_len {
                chunk.diagnostics.push(
                    Diagnostic::new(
                        ErrorKind::Resource,
                        format!("record too long (more than {} bytes)", self.max_record_len),
                    )
                    .at_line(self.line)
                    .at_row(self.next_row + 1),
                );
                self.done = true;
                continue;
            }

            if let Some(echo) = self.echo.as_mut() {
                echo.write_all(ECHO_PROMPT)?;
                echo.flush()?;
            }
            let hint = self.buffer_size.max(pending);
            cursor.refill(hint)?;
            chunk.refills += 1;
        }
    }

    /// Scan the cursor's window and copy complete records into `chunk`.
    ///
    /// Returns the number of window bytes used up and whether the scan
    /// stopped for lack of data.
    fn take_records(&mut self, cursor: &dyn ByteCursor, chunk: &mut RecordChunk) -> (usize, bool) {
        let window = cursor.window();
        let base = chunk.data.len();
        let mut consumed = 0;
        let mut want_more = false;

        let mut records = self.tokenizer.records(window, cursor.at_end_of_input());
        while let Some(scan) = records.next() {
            match scan {
                Scan::Complete { start, end, newlines, .. } | Scan::Final { start, end, newlines } => {
                    let line = self.line;
                    self.line += newlines;
                    consumed = records.position();
                    if self.skip_remaining > 0 {
                        self.skip_remaining -= 1;
                        continue;
                    }
                    let row = self.next_row;
                    self.next_row += 1;
                    if let Some(rem) = self.remaining.as_mut() {
                        *rem -= 1;
                    }
                    let bytes = &window[start..end];
                    match std::str::from_utf8(bytes) {
                        Ok(_) => chunk.records.push(RecordRef {
                            start: base + start,
                            end: base + end,
                            line,
                            row,
                        }),
                        Err(e) => chunk.diagnostics.push(
                            Diagnostic::new(
                                ErrorKind::MalformedRecord,
                                format!("invalid UTF-8 at byte {}", e.valid_up_to()),
                            )
                            .at_line(line)
                            .at_row(row + 1)
                            .with_input(bytes),
                        ),
                    }
                    if self.remaining == Some(0) || chunk.records.len() >= self.batch_rows {
                        break;
                    }
                }
                Scan::NeedMore { .. } => want_more = true,
                Scan::UnterminatedQuote { start, newlines } => {
                    chunk.diagnostics.push(
                        Diagnostic::new(ErrorKind::MalformedRecord, "unterminated quoted value")
                            .at_line(self.line)
                            .at_row(self.next_row + 1)
                            .with_input(&window[start..]),
                    );
                    self.line += newlines;
                    self.next_row += 1;
                    consumed = window.len();
                    self.done = true;
                }
                Scan::Exhausted => {}
            }
        }
        if records.position() >= window.len() && cursor.at_end_of_input() {
            self.done = true;
        }

        chunk.data.extend_from_slice(&window[..consumed]);
        (consumed, want_more)
    }
}
