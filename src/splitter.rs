//! Field splitting and field text decoding.
//!
//! [`split_record`] cuts one record into per-column [`Field`] spans without
//! copying. Decoding (quote removal, doubled quotes, backslash escapes) is
//! deferred to [`decode_field`], which the converter calls on each field.

use std::borrow::Cow;
use std::str::Utf8Error;

use crate::batch::Field;

/// How one column's field is delimited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ColumnFormat {
    /// Bytes terminating this column's field.
    pub separator: Vec<u8>,
    pub quote: Option<u8>,
    pub null_marker: Option<Vec<u8>>,
}

/// Why a record failed to split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SplitError {
    /// Fewer fields than columns; `column` is the first missing one.
    ValueMissing { column: usize },
    /// A quoted field in `column` never closes.
    QuoteMissing { column: usize, quote: u8 },
    /// Text after the last column's separator.
    Leftover { start: usize, end: usize },
}

impl SplitError {
    pub(crate) fn column(&self, columns: usize) -> usize {
        match self {
            Self::ValueMissing { column } | Self::QuoteMissing { column, .. } => *column,
            Self::Leftover { .. } => columns.saturating_sub(1),
        }
    }

    pub(crate) fn message(&self, data: &[u8]) -> String {
        match self {
            Self::ValueMissing { .. } => "Column value missing".to_string(),
            Self::QuoteMissing { quote, .. } => format!("Quote ({}) missing", char::from(*quote)),
            Self::Leftover { start, end } => format!(
                "Leftover data '{}'",
                crate::error::escape_invalid_utf8(&data[*start..*end])
            ),
        }
    }
}

/// Offset of the first unescaped `sep` in `data[from..end]`.
fn find_separator(data: &[u8], from: usize, end: usize, sep: &[u8], escape: bool) -> Option<usize> {
    let mut i = from;
    while i < end {
        if escape && data[i] == b'\\' {
            i += 2;
            continue;
        }
        if data[i..end].starts_with(sep) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Offset of the quote closing a value that opened just before `from`.
fn closing_quote(data: &[u8], from: usize, end: usize, quote: u8, escape: bool) -> Option<usize> {
    let mut i = from;
    while i < end {
        let b = data[i];
        if escape && b == b'\\' && i + 1 < end {
            i += 2;
        } else if b == quote {
            if i + 1 < end && data[i + 1] == quote {
                i += 2;
            } else {
                return Some(i);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// Split the record `data[start..end]` into `out[col]`, one entry per column.
///
/// A field that begins with the column's quote runs to the matching closing
/// quote; bytes between that quote and the next separator are ignored. On
/// error, entries from the failing column on are left untouched.
pub(crate) fn split_record(
    data: &[u8],
    start: usize,
    end: usize,
    formats: &[ColumnFormat],
    escape: bool,
    out: &mut [Field],
) -> Result<(), SplitError> {
    let columns = formats.len();
    let mut pos = start;
    for (col, fmt) in formats.iter().enumerate() {
        let last = col + 1 == columns;
        let field_start;
        let mut field_end = None;

        let opens_quote = fmt.quote.filter(|&q| pos < end && data[pos] == q);
        if let Some(q) = opens_quote {
            let close = closing_quote(data, pos + 1, end, q, escape)
                .ok_or(SplitError::QuoteMissing { column: col, quote: q })?;
            field_start = pos + 1;
            field_end = Some(close);
            pos = close + 1;
        } else {
            field_start = pos;
        }

        match find_separator(data, pos, end, &fmt.separator, escape) {
            Some(at) => {
                let value_end = *field_end.get_or_insert(at);
                debug_assert!(value_end <= at);
                pos = at + fmt.separator.len();
                if last && pos < end {
                    return Err(SplitError::Leftover { start: pos, end });
                }
            }
            None => {
                field_end.get_or_insert(end);
                pos = end;
                if !last {
                    return Err(SplitError::ValueMissing { column: col + 1 });
                }
            }
        }

        let field_end = field_end.unwrap_or(end);
        let raw = &data[field_start..field_end];
        let is_null = opens_quote.is_none()
            && fmt
                .null_marker
                .as_deref()
                .is_some_and(|m| raw.eq_ignore_ascii_case(m));
        out[col] = if is_null {
            Field::Null
        } else {
            Field::Text {
                start: field_start,
                end: field_end,
                quoted: opens_quote.is_some(),
            }
        };
    }
    Ok(())
}

/// Decode a field's raw bytes to text.
///
/// `quote` is the quote character of a quoted field (doubled quotes collapse
/// to one); `escape` enables backslash escapes: `\n \t \r \b \f`, 1 to 3
/// octal digits, otherwise the escaped byte itself.
pub(crate) fn decode_field(raw: &[u8], quote: Option<u8>, escape: bool) -> Result<Cow<'_, str>, Utf8Error> {
    let needs_work = raw
        .iter()
        .any(|&b| (escape && b == b'\\') || quote == Some(b));
    if !needs_work {
        return std::str::from_utf8(raw).map(Cow::Borrowed);
    }

    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if escape && b == b'\\' && i + 1 < raw.len() {
            i += 1;
            let c = raw[i];
            match c {
                b'n' => out.push(b'\n'),
                b't' => out.push(b'\t'),
                b'r' => out.push(b'\r'),
                b'b' => out.push(0x08),
                b'f' => out.push(0x0c),
                b'0'..=b'7' => {
                    let mut value = u32::from(c - b'0');
                    let mut digits = 1;
                    while digits < 3 && i + 1 < raw.len() && (b'0'..=b'7').contains(&raw[i + 1]) {
                        i += 1;
                        value = value * 8 + u32::from(raw[i] - b'0');
                        digits += 1;
                    }
                    out.push((value & 0xff) as u8);
                }
                other => out.push(other),
            }
            i += 1;
        } else if quote == Some(b) && raw.get(i + 1) == Some(&b) {
            out.push(b);
            i += 2;
        } else {
            out.push(b);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map(Cow::Owned)
        .map_err(|e| e.utf8_error())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats(n: usize, sep: &[u8], quote: Option<u8>, null: Option<&str>) -> Vec<ColumnFormat> {
        (0..n)
            .map(|_| ColumnFormat {
                separator: sep.to_vec(),
                quote,
                null_marker: null.map(|s| s.as_bytes().to_vec()),
            })
            .collect()
    }

    fn split(input: &str, fmts: &[ColumnFormat]) -> Result<Vec<Field>, SplitError> {
        let mut out = vec![Field::Absent; fmts.len()];
        split_record(input.as_bytes(), 0, input.len(), fmts, true, &mut out)?;
        Ok(out)
    }

    fn texts(input: &str, fields: &[Field], quote: Option<u8>) -> Vec<String> {
        fields
            .iter()
            .map(|f| match *f {
                Field::Text { start, end, quoted } => {
                    decode_field(&input.as_bytes()[start..end], quoted.then_some(quote).flatten(), true)
                        .unwrap()
                        .into_owned()
                }
                Field::Null => "<null>".into(),
                Field::Absent => "<absent>".into(),
            })
            .collect()
    }

    #[test]
    fn quoted_separator_stays_in_value() {
        let f = formats(2, b",", Some(b'"'), None);
        let input = "\"a,b\",c";
        let fields = split(input, &f).unwrap();
        assert_eq!(texts(input, &fields, Some(b'"')), ["a,b", "c"]);
    }

    #[test]
    fn doubled_quotes_and_junk_after_closing_quote() {
        let f = formats(2, b"|", Some(b'\''), None);
        let input = "'it''s'junk|x";
        let fields = split(input, &f).unwrap();
        assert_eq!(texts(input, &fields, Some(b'\'')), ["it's", "x"]);
    }

    #[test]
    fn multi_byte_separator_and_escapes() {
        let f = formats(3, b"::", None, None);
        let input = "a\\::b::\\t\\101::";
        let fields = split(input, &f).unwrap();
        assert_eq!(texts(input, &fields, None), ["a::b", "\tA", ""]);
    }

    #[test]
    fn null_marker_is_case_insensitive_and_unquoted_only() {
        let f = formats(3, b",", Some(b'"'), Some("null"));
        let input = "NULL,\"null\",x";
        let fields = split(input, &f).unwrap();
        assert_eq!(texts(input, &fields, Some(b'"')), ["<null>", "null", "x"]);
    }

    #[test]
    fn split_errors_are_located() {
        let f = formats(3, b",", Some(b'"'), None);
        assert_eq!(split("1,2", &f), Err(SplitError::ValueMissing { column: 2 }));
        assert_eq!(
            split("1,\"2,3", &f),
            Err(SplitError::QuoteMissing { column: 1, quote: b'"' })
        );
        let err = split("1,2,3,4", &f).unwrap_err();
        assert_eq!(err, SplitError::Leftover { start: 6, end: 7 });
        assert_eq!(err.message(b"1,2,3,4"), "Leftover data '4'");
        assert!(split("1,2,3,", &f).is_ok());
    }

    #[test]
    fn per_column_separator_override() {
        let mut f = formats(3, b",", None, None);
        f[0].separator = b"|".to_vec();
        let input = "a,b|c,d";
        let fields = split(input, &f).unwrap();
        assert_eq!(texts(input, &fields, None), ["a,b", "c", "d"]);
    }
}
