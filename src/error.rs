//! Error types for bulk loads.
//!
//! Every problem the loader detects is described by a [`Diagnostic`]. Whether a
//! diagnostic stops the load depends on its [`ErrorKind`] and on the
//! [`ErrorMode`](crate::sink::ErrorMode) of the load; the first fatal one is
//! surfaced to the caller as [`LoadError::Rejected`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of load problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A record could not be delimited or decoded (unterminated quote at end of
    /// input, invalid UTF-8).
    MalformedRecord,
    /// A record does not split into the expected number of fields.
    MalformedField,
    /// A field's text does not parse to the column's type.
    Conversion,
    /// Buffer growth failed or a record exceeded the configured length limit.
    Resource,
    /// The byte stream could not be read.
    Io,
}

impl ErrorKind {
    /// Resource and I/O problems stop the load regardless of the error mode.
    #[must_use]
    pub fn is_always_fatal(self) -> bool {
        matches!(self, Self::Resource | Self::Io)
    }
}

/// One located problem found during a load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// 1-based line number where the offending record starts.
    pub line: Option<u64>,
    /// 1-based ordinal of the record among the records handed to the loader
    /// (skipped records excluded).
    pub row: Option<u64>,
    /// 0-based column index.
    pub column: Option<usize>,
    pub column_name: Option<String>,
    pub message: String,
    /// The offending input, with invalid UTF-8 bytes rendered as `<XX>`.
    pub input: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: None,
            row: None,
            column: None,
            column_name: None,
            message: message.into(),
            input: None,
        }
    }

    #[must_use]
    pub fn at_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn at_row(mut self, row: u64) -> Self {
        self.row = Some(row);
        self
    }

    #[must_use]
    pub fn in_column(mut self, column: usize, name: impl Into<String>) -> Self {
        self.column = Some(column);
        self.column_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: &[u8]) -> Self {
        self.input = Some(escape_invalid_utf8(input));
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        if let Some(col) = self.column {
            write!(f, "column {}", col + 1)?;
            if let Some(name) = self.column_name.as_deref().filter(|n| !n.is_empty()) {
                write!(f, " {name}")?;
            }
            write!(f, ": ")?;
        }
        f.write_str(&self.message)
    }
}

/// Failure of a whole load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The first fatal diagnostic of the load.
    #[error("{0}")]
    Rejected(Diagnostic),
    #[error("read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid load configuration: {0}")]
    Config(String),
    #[error("cannot start worker pool: {0}")]
    Pool(String),
}

impl LoadError {
    /// The diagnostic behind a rejected load, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Rejected(d) => Some(d),
            _ => None,
        }
    }
}

/// Copy `bytes` into a `String`, replacing every byte that is not part of a
/// valid UTF-8 sequence with its hexadecimal form `<XX>`.
pub fn escape_invalid_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
        for b in chunk.invalid() {
            out.push_str(&format!("<{b:02X}>"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_located_format() {
        let d = Diagnostic::new(ErrorKind::Conversion, "'int' expected in 'x'")
            .at_line(7)
            .in_column(2, "qty");
        assert_eq!(d.to_string(), "line 7: column 3 qty: 'int' expected in 'x'");

        let bare = Diagnostic::new(ErrorKind::Resource, "record too long");
        assert_eq!(bare.to_string(), "record too long");
    }

    #[test]
    fn invalid_bytes_are_hex_escaped() {
        assert_eq!(escape_invalid_utf8(b"ab\xffc"), "ab<FF>c");
        assert_eq!(escape_invalid_utf8("é".as_bytes()), "é");
    }
}
