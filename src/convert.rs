//! Column conversion: one column's fields for a whole round, in row order.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::batch::{CONVERT_ERROR, Field, RecordChunk, SPLIT_ERROR};
use crate::column::ColumnDescriptor;
use crate::error::{Diagnostic, ErrorKind, escape_invalid_utf8};
use crate::sink::{Disposition, ErrorSink};
use crate::splitter::{ColumnFormat, decode_field};

/// Read-only state of the current round shared by all converting workers.
pub(crate) struct RoundView<'b> {
    pub chunk: &'b RecordChunk,
    pub fields: &'b [Vec<Field>],
    pub flags: &'b [AtomicU8],
    pub format: &'b [ColumnFormat],
    pub escape: bool,
    pub sink: &'b ErrorSink,
}

/// Convert and append column `col` for every row of the round that split
/// cleanly.
///
/// Unparseable text is stored as the column's null, the row is flagged and a
/// diagnostic is reported. Returns `false` when the load must stop.
pub(crate) fn convert_column(view: &RoundView<'_>, col: usize, desc: &mut ColumnDescriptor<'_>) -> bool {
    let probe = desc.sink.probe();
    let _inside = probe.as_deref().map(|p| p.enter());

    let rows = view.fields[col].len();
    if let Err(e) = desc.sink.try_grow(rows) {
        let diag = Diagnostic::new(
            ErrorKind::Resource,
            format!("failed to grow column by {rows} rows: {e}"),
        )
        .in_column(col, desc.name());
        view.sink.report(diag);
        return false;
    }

    let quote = view.format[col].quote;
    for (row, field) in view.fields[col].iter().enumerate() {
        if view.flags[row].load(Ordering::Acquire) & SPLIT_ERROR != 0 {
            continue;
        }
        let (start, end, quoted) = match *field {
            Field::Absent | Field::Null => {
                desc.sink.append_null();
                continue;
            }
            Field::Text { start, end, quoted } => (start, end, quoted),
        };

        let raw = &view.chunk.data[start..end];
        let parsed = match decode_field(raw, quote.filter(|_| quoted), view.escape) {
            Ok(text) => desc.sink.append_text(&text),
            Err(_) => false,
        };
        if parsed {
            continue;
        }

        desc.sink.append_null();
        view.flags[row].fetch_or(CONVERT_ERROR, Ordering::AcqRel);
        let rec = &view.chunk.records[row];
        let diag = Diagnostic::new(
            ErrorKind::Conversion,
            format!("'{}' expected in '{}'", desc.type_name(), escape_invalid_utf8(raw)),
        )
        .at_line(rec.line)
        .at_row(rec.row + 1)
        .in_column(col, desc.name())
        .with_input(view.chunk.record_bytes(row));
        if view.sink.report(diag) == Disposition::Stop {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RecordRef;
    use crate::column::{ColumnBuffer, FromStrParser};

    fn view_parts(text: &str) -> (RecordChunk, Vec<Vec<Field>>, Vec<AtomicU8>) {
        let mut chunk = RecordChunk::default();
        chunk.data = text.as_bytes().to_vec();
        let mut fields = vec![Vec::new()];
        let mut pos = 0;
        for (row, value) in text.split(',').enumerate() {
            let end = pos + value.len();
            chunk.records.push(RecordRef {
                start: pos,
                end,
                line: row as u64 + 1,
                row: row as u64,
            });
            fields[0].push(if value == "-" {
                Field::Null
            } else {
                Field::Text { start: pos, end, quoted: false }
            });
            pos = end + 1;
        }
        let flags = (0..fields[0].len()).map(|_| AtomicU8::new(0)).collect();
        (chunk, fields, flags)
    }

    #[test]
    fn bad_value_becomes_null_and_flags_row() {
        let (chunk, fields, flags) = view_parts("1,x,-,4");
        let format = vec![ColumnFormat::default()];
        let sink = ErrorSink::collect();
        let view = RoundView {
            chunk: &chunk,
            fields: &fields,
            flags: &flags,
            format: &format,
            escape: false,
            sink: &sink,
        };
        let mut col = ColumnBuffer::<i32>::new();
        {
            let mut desc = ColumnDescriptor::new("n", FromStrParser::<i32>::new("int"), &mut col);
            assert!(convert_column(&view, 0, &mut desc));
        }
        assert_eq!(col.values(), &[1, i32::MIN, i32::MIN, 4]);
        assert_eq!(flags[1].load(Ordering::Relaxed), CONVERT_ERROR);
        assert_eq!(flags[2].load(Ordering::Relaxed), 0);

        let rejects = sink.rejects().unwrap();
        let table = rejects.lock().unwrap();
        assert_eq!(table.entries()[0].message, "'int' expected in 'x'");
        assert_eq!(table.entries()[0].to_string(), "line 2: column 1 n: 'int' expected in 'x'");
    }

    #[test]
    fn split_error_rows_are_skipped() {
        let (chunk, fields, flags) = view_parts("1,2,3");
        flags[1].store(SPLIT_ERROR, Ordering::Relaxed);
        let format = vec![ColumnFormat::default()];
        let sink = ErrorSink::abort();
        let view = RoundView {
            chunk: &chunk,
            fields: &fields,
            flags: &flags,
            format: &format,
            escape: false,
            sink: &sink,
        };
        let mut col = ColumnBuffer::<i64>::new();
        {
            let mut desc = ColumnDescriptor::new("n", FromStrParser::<i64>::new("bigint"), &mut col);
            assert!(convert_column(&view, 0, &mut desc));
        }
        assert_eq!(col.values(), &[1, 3]);
        assert!(!sink.is_fatal());
    }
}
