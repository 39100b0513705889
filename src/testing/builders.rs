//! Builders for delimited test inputs.

/// Builds delimited text row by row, quoting fields that need it.
///
/// # Example
///
/// ```
/// use ironload::testing::DelimitedBuilder;
///
/// let text = DelimitedBuilder::new()
///     .row(["1", "plain"])
///     .row(["2", "has,comma"])
///     .row(["3", "say \"hi\""])
///     .build();
///
/// assert_eq!(text, "1,plain\n2,\"has,comma\"\n3,\"say \"\"hi\"\"\"\n");
/// ```
#[derive(Debug, Clone)]
pub struct DelimitedBuilder {
    column_separator: String,
    record_separator: String,
    quote: Option<char>,
    out: String,
    rows: usize,
}

impl Default for DelimitedBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DelimitedBuilder {
    /// Comma-separated, newline-terminated, `"`-quoted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            column_separator: ",".into(),
            record_separator: "\n".into(),
            quote: Some('"'),
            out: String::new(),
            rows: 0,
        }
    }

    #[must_use]
    pub fn column_separator(mut self, sep: impl Into<String>) -> Self {
        self.column_separator = sep.into();
        self
    }

    #[must_use]
    pub fn record_separator(mut self, sep: impl Into<String>) -> Self {
        self.record_separator = sep.into();
        self
    }

    /// Quote character used for fields containing separators; `None` writes
    /// every field verbatim.
    #[must_use]
    pub fn quote(mut self, quote: Option<char>) -> Self {
        self.quote = quote;
        self
    }

    /// Append one record.
    #[must_use]
    pub fn row<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                self.out.push_str(&self.column_separator);
            }
            self.push_field(field.as_ref());
        }
        self.out.push_str(&self.record_separator);
        self.rows += 1;
        self
    }

    /// Append `n` records produced by `make(row_index)`.
    #[must_use]
    pub fn rows<F, I, S>(mut self, n: usize, mut make: F) -> Self
    where
        F: FnMut(usize) -> I,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for i in 0..n {
            self = self.row(make(i));
        }
        self
    }

    fn push_field(&mut self, field: &str) {
        let needs_quotes = self.quote.is_some_and(|q| {
            field.contains(self.column_separator.as_str())
                || field.contains(self.record_separator.as_str())
                || field.contains(q)
                || field.contains('\\')
        });
        match self.quote {
            Some(q) if needs_quotes => {
                self.out.push(q);
                for c in field.chars() {
                    if c == q {
                        self.out.push(q);
                    } else if c == '\\' {
                        self.out.push('\\');
                    }
                    self.out.push(c);
                }
                self.out.push(q);
            }
            _ => self.out.push_str(field),
        }
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[must_use]
    pub fn build(self) -> String {
        self.out
    }

    #[must_use]
    pub fn build_bytes(self) -> Vec<u8> {
        self.out.into_bytes()
    }
}

/// `n` records of `columns` integer fields where field `c` of row `r` is
/// `r * columns + c`.
///
/// ```
/// use ironload::testing::numbered_rows;
///
/// assert_eq!(numbered_rows(2, 3), "0,1,2\n3,4,5\n");
/// ```
#[must_use]
pub fn numbered_rows(n: usize, columns: usize) -> String {
    DelimitedBuilder::new()
        .rows(n, |r| (0..columns).map(move |c| (r * columns + c).to_string()))
        .build()
}
