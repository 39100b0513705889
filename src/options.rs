//! Load configuration.
//!
//! [`LoadOptions`] is plain data: build it with the `with_*` setters or
//! deserialize it from JSON. Every field has a default, so a JSON document
//! only needs the settings it changes:
//!
//! ```
//! use ironload::{ErrorMode, LoadOptions};
//!
//! let opts = LoadOptions::from_json_str(r#"{ "column_separator": "|", "error_mode": "collect" }"#).unwrap();
//! assert_eq!(opts.column_separator, "|");
//! assert_eq!(opts.error_mode, ErrorMode::Collect);
//! assert_eq!(opts.record_separator, "\n");
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cursor::DEFAULT_CAPACITY;
use crate::divider::DEFAULT_REBALANCE_ROUNDS;
use crate::error::LoadError;
use crate::sink::ErrorMode;

/// Default limit on the size of one record (256 MiB).
pub const DEFAULT_MAX_RECORD_LEN: usize = 256 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub column_separator: String,
    pub record_separator: String,
    /// ASCII quote character; `None` disables quoting.
    pub quote: Option<char>,
    /// Honor backslash escapes.
    pub escape: bool,
    /// Records discarded before loading starts.
    pub skip_rows: u64,
    /// Stop after this many records; `None` loads everything.
    pub max_rows: Option<u64>,
    /// Worker threads; defaults to the number of cores.
    pub threads: Option<usize>,
    pub error_mode: ErrorMode,
    /// Read and delimit the next chunk on a separate thread.
    pub prefetch: bool,
    /// Rounds after which the column assignment freezes.
    pub rebalance_rounds: usize,
    /// Records per round; `None` takes whatever the buffer holds.
    pub batch_rows: Option<usize>,
    /// Refill size hint for the input cursor.
    pub buffer_size: usize,
    pub max_record_len: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            column_separator: ",".into(),
            record_separator: "\n".into(),
            quote: Some('"'),
            escape: true,
            skip_rows: 0,
            max_rows: None,
            threads: None,
            error_mode: ErrorMode::Abort,
            prefetch: true,
            rebalance_rounds: DEFAULT_REBALANCE_ROUNDS,
            batch_rows: None,
            buffer_size: DEFAULT_CAPACITY,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }
}

impl LoadOptions {
    #[must_use]
    pub fn with_column_separator(mut self, sep: impl Into<String>) -> Self {
        self.column_separator = sep.into();
        self
    }

    #[must_use]
    pub fn with_record_separator(mut self, sep: impl Into<String>) -> Self {
        self.record_separator = sep.into();
        self
    }

    #[must_use]
    pub fn with_quote(mut self, quote: Option<char>) -> Self {
        self.quote = quote;
        self
    }

    #[must_use]
    pub fn with_escape(mut self, escape: bool) -> Self {
        self.escape = escape;
        self
    }

    #[must_use]
    pub fn with_skip_rows(mut self, n: u64) -> Self {
        self.skip_rows = n;
        self
    }

    #[must_use]
    pub fn with_max_rows(mut self, n: Option<u64>) -> Self {
        self.max_rows = n;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, n: usize) -> Self {
        self.threads = Some(n);
        self
    }

    #[must_use]
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    #[must_use]
    pub fn with_prefetch(mut self, on: bool) -> Self {
        self.prefetch = on;
        self
    }

    #[must_use]
    pub fn with_rebalance_rounds(mut self, n: usize) -> Self {
        self.rebalance_rounds = n;
        self
    }

    #[must_use]
    pub fn with_batch_rows(mut self, n: usize) -> Self {
        self.batch_rows = Some(n);
        self
    }

    #[must_use]
    pub fn with_buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n;
        self
    }

    #[must_use]
    pub fn with_max_record_len(mut self, n: usize) -> Self {
        self.max_record_len = n;
        self
    }

    /// The quote character as a byte.
    pub(crate) fn quote_byte(&self) -> Option<u8> {
        self.quote.and_then(|q| u8::try_from(q).ok())
    }

    /// Reject settings no load can run with.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.column_separator.is_empty() {
            return Err(LoadError::Config("column separator is empty".into()));
        }
        if self.record_separator.is_empty() {
            return Err(LoadError::Config("record separator is empty".into()));
        }
        if let Some(q) = self.quote {
            if !q.is_ascii() {
                return Err(LoadError::Config(format!("quote {q:?} is not an ASCII character")));
            }
        }
        if self.threads == Some(0) {
            return Err(LoadError::Config("thread count must be at least 1".into()));
        }
        if self.batch_rows == Some(0) {
            return Err(LoadError::Config("batch_rows must be at least 1".into()));
        }
        if self.buffer_size == 0 {
            return Err(LoadError::Config("buffer size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json).context("parse load options")?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read load options from {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("load options in {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_empty_separators_and_wide_quotes() {
        assert!(LoadOptions::default().validate().is_ok());
        assert!(LoadOptions::default().with_column_separator("").validate().is_err());
        assert!(LoadOptions::default().with_quote(Some('«')).validate().is_err());
        assert!(LoadOptions::default().with_threads(0).validate().is_err());
    }

    #[test]
    fn json_round_trip_keeps_every_field() {
        let opts = LoadOptions::default()
            .with_record_separator("\r\n")
            .with_quote(None)
            .with_max_rows(Some(10))
            .with_batch_rows(7);
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(LoadOptions::from_json_str(&json).unwrap(), opts);
    }
}
