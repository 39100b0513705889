//! Record boundary detection over a raw byte window.
//!
//! The tokenizer walks the window with a three-state quoting machine
//! (unquoted, quoted, escaped-next) and feeds unquoted bytes to a
//! [`SeparatorDfa`] that recognizes the record separator. When columns quote
//! differently, it also follows column separators so that only the current
//! column's quote character toggles quoting. A scan always starts
//! at the first byte of a record; when the window ends inside a record the
//! caller refills and scans that record again from its start.

use crate::error::LoadError;
use crate::splitter::ColumnFormat;

/// KMP automaton for a byte-string separator.
///
/// State `n` means the last `n` bytes seen equal the first `n` bytes of the
/// separator; reaching `len()` is a match.
#[derive(Debug, Clone)]
pub(crate) struct SeparatorDfa {
    table: Vec<[u32; 256]>,
}

impl SeparatorDfa {
    /// `None` for an empty separator.
    pub(crate) fn new(sep: &[u8]) -> Option<Self> {
        let (&first, _) = sep.split_first()?;
        let mut table = vec![[0u32; 256]; sep.len()];
        table[0][usize::from(first)] = 1;
        let mut restart = 0usize;
        for j in 1..sep.len() {
            table[j] = table[restart];
            table[j][usize::from(sep[j])] = j as u32 + 1;
            restart = table[restart][usize::from(sep[j])] as usize;
        }
        Some(Self { table })
    }

    #[inline]
    pub(crate) fn step(&self, state: u32, byte: u8) -> u32 {
        self.table[state as usize][usize::from(byte)]
    }

    #[inline]
    pub(crate) fn is_match(&self, state: u32) -> bool {
        state as usize == self.table.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }
}

/// Outcome of scanning for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scan {
    /// `start..end` is a record terminated by a separator ending at `next`.
    Complete {
        start: usize,
        end: usize,
        next: usize,
        newlines: u64,
    },
    /// At end of input, `start..end` is the final unterminated record.
    Final { start: usize, end: usize, newlines: u64 },
    /// The record starting at `start` is incomplete; refill and rescan from it.
    NeedMore { start: usize },
    /// At end of input, the record starting at `start` has an open quote.
    UnterminatedQuote { start: usize, newlines: u64 },
    /// Nothing left at end of input.
    Exhausted,
}

#[derive(Debug, Clone)]
struct ColumnDelims {
    separator: SeparatorDfa,
    quote: Option<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct RecordTokenizer {
    dfa: SeparatorDfa,
    quote: Option<u8>,
    escape: bool,
    /// Empty unless some column overrides the quote.
    columns: Vec<ColumnDelims>,
}

impl RecordTokenizer {
    pub(crate) fn new(
        record_separator: &[u8],
        quote: Option<u8>,
        escape: bool,
    ) -> Result<Self, LoadError> {
        let dfa = SeparatorDfa::new(record_separator)
            .ok_or_else(|| LoadError::Config("record separator is empty".into()))?;
        Ok(Self {
            dfa,
            quote,
            escape,
            columns: Vec::new(),
        })
    }

    /// Track column boundaries with `formats` if any column quotes with
    /// something other than the load-wide quote.
    pub(crate) fn with_columns(mut self, formats: &[ColumnFormat]) -> Result<Self, LoadError> {
        if formats.iter().all(|f| f.quote == self.quote) {
            return Ok(self);
        }
        self.columns = formats
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let separator = SeparatorDfa::new(&f.separator)
                    .ok_or_else(|| LoadError::Config(format!("column {i}: empty separator")))?;
                Ok(ColumnDelims {
                    separator,
                    quote: f.quote,
                })
            })
            .collect::<Result<_, LoadError>>()?;
        Ok(self)
    }

    #[inline]
    fn quote_of(&self, column: usize) -> Option<u8> {
        match self.columns.get(column) {
            Some(delims) => delims.quote,
            None => self.quote,
        }
    }

    /// Scan the record starting at `from`.
    pub(crate) fn scan(&self, window: &[u8], from: usize, at_eof: bool) -> Scan {
        if from >= window.len() {
            return if at_eof {
                Scan::Exhausted
            } else {
                Scan::NeedMore { start: from }
            };
        }

        let mut state = 0u32;
        let mut column = 0usize;
        let mut column_state = 0u32;
        let mut quoted = false;
        let mut escaped = false;
        let mut newlines = 0u64;
        for (i, &b) in window.iter().enumerate().skip(from) {
            if b == b'\n' {
                newlines += 1;
            }
            if escaped {
                escaped = false;
                state = 0;
                column_state = 0;
                continue;
            }
            if self.escape && b == b'\\' {
                escaped = true;
                state = 0;
                column_state = 0;
                continue;
            }
            if self.quote_of(column) == Some(b) {
                quoted = !quoted;
                state = 0;
                column_state = 0;
                continue;
            }
            if quoted {
                continue;
            }
            state = self.dfa.step(state, b);
            if self.dfa.is_match(state) {
                let next = i + 1;
                return Scan::Complete {
                    start: from,
                    end: next - self.dfa.len(),
                    next,
                    newlines,
                };
            }
            // The last column absorbs any leftover fields.
            if column + 1 < self.columns.len() {
                let sep = &self.columns[column].separator;
                column_state = sep.step(column_state, b);
                if sep.is_match(column_state) {
                    column += 1;
                    column_state = 0;
                }
            }
        }

        if !at_eof {
            Scan::NeedMore { start: from }
        } else if quoted {
            Scan::UnterminatedQuote {
                start: from,
                newlines,
            }
        } else {
            Scan::Final {
                start: from,
                end: window.len(),
                newlines,
            }
        }
    }

    /// Lazy sequence of scans over `window`, starting at its first byte.
    pub(crate) fn records<'t, 'w>(&'t self, window: &'w [u8], at_eof: bool) -> Records<'t, 'w> {
        Records {
            tokenizer: self,
            window,
            pos: 0,
            at_eof,
            done: false,
        }
    }
}

/// Iterator over the records of one window. It stops after the first
/// [`Scan::NeedMore`], [`Scan::UnterminatedQuote`] or [`Scan::Final`].
pub(crate) struct Records<'t, 'w> {
    tokenizer: &'t RecordTokenizer,
    window: &'w [u8],
    pos: usize,
    at_eof: bool,
    done: bool,
}

impl Records<'_, '_> {
    /// Offset just past the last record yielded.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Records<'_, '_> {
    type Item = Scan;

    fn next(&mut self) -> Option<Scan> {
        if self.done {
            return None;
        }
        let scan = self.tokenizer.scan(self.window, self.pos, self.at_eof);
        match scan {
            Scan::Complete { next, .. } => self.pos = next,
            Scan::Final { end, .. } => {
                self.pos = end;
                self.done = true;
            }
            Scan::Exhausted => {
                self.done = true;
                return None;
            }
            Scan::NeedMore { .. } | Scan::UnterminatedQuote { .. } => self.done = true,
        }
        Some(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(tok: &RecordTokenizer, input: &[u8], at_eof: bool) -> Vec<String> {
        tok.records(input, at_eof)
            .map(|s| match s {
                Scan::Complete { start, end, .. } | Scan::Final { start, end, .. } => {
                    String::from_utf8_lossy(&input[start..end]).into_owned()
                }
                Scan::NeedMore { .. } => "<more>".into(),
                Scan::UnterminatedQuote { .. } => "<quote>".into(),
                Scan::Exhausted => "<end>".into(),
            })
            .collect()
    }

    #[test]
    fn dfa_recognizes_self_overlapping_separator() {
        let dfa = SeparatorDfa::new(b"aab").unwrap();
        let mut state = 0;
        let mut hits = Vec::new();
        for (i, &b) in b"aaab".iter().enumerate() {
            state = dfa.step(state, b);
            if dfa.is_match(state) {
                hits.push(i);
                state = 0;
            }
        }
        assert_eq!(hits, [3]);
        assert!(SeparatorDfa::new(b"").is_none());
    }

    #[test]
    fn multi_byte_separator_and_trailing_record() {
        let tok = RecordTokenizer::new(b"\r\n", None, true).unwrap();
        assert_eq!(bounds(&tok, b"a\rb\r\nc\r\nd", true), ["a\rb", "c", "d"]);
        assert_eq!(bounds(&tok, b"a\r\nc\r", false), ["a", "<more>"]);
    }

    #[test]
    fn quoted_and_escaped_separators_do_not_split() {
        let tok = RecordTokenizer::new(b"\n", Some(b'"'), true).unwrap();
        assert_eq!(
            bounds(&tok, b"\"x\ny\",1\nz\\\nw\n", true),
            ["\"x\ny\",1", "z\\\nw"]
        );
    }

    #[test]
    fn open_quote_at_end_of_input() {
        let tok = RecordTokenizer::new(b"\n", Some(b'\''), false).unwrap();
        assert_eq!(bounds(&tok, b"ok\n'never closed", true), ["ok", "<quote>"]);
        assert_eq!(bounds(&tok, b"ok\n'never closed", false), ["ok", "<more>"]);
    }

    fn format(separator: &str, quote: Option<u8>) -> ColumnFormat {
        ColumnFormat {
            separator: separator.as_bytes().to_vec(),
            quote,
            null_marker: None,
        }
    }

    #[test]
    fn column_quote_overrides_the_load_quote() {
        let tok = RecordTokenizer::new(b"\n", Some(b'"'), false)
            .unwrap()
            .with_columns(&[format(",", Some(b'\'')), format(",", Some(b'"'))])
            .unwrap();
        assert_eq!(
            bounds(&tok, b"'5\" tv',1\n'7\" tv',\"x\ny\"\n", true),
            ["'5\" tv',1", "'7\" tv',\"x\ny\""]
        );
    }

    #[test]
    fn multi_byte_column_separator_advances_the_column() {
        let tok = RecordTokenizer::new(b"\n", None, false)
            .unwrap()
            .with_columns(&[format("::", None), format(",", Some(b'|'))])
            .unwrap();
        assert_eq!(bounds(&tok, b"a|b:c::|d\ne|\n", true), ["a|b:c::|d\ne|"]);
        assert_eq!(bounds(&tok, b"|x\n", true), ["|x"]);
    }

    #[test]
    fn newline_count_covers_record_and_separator() {
        let tok = RecordTokenizer::new(b"\n", Some(b'"'), false).unwrap();
        match tok.scan(b"\"a\nb\"\nrest", 0, false) {
            Scan::Complete { newlines, next, .. } => {
                assert_eq!(newlines, 2);
                assert_eq!(next, 6);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
