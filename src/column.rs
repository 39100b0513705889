//! Typed column targets and the parsers that feed them.
//!
//! A [`ColumnBuffer<T>`] is a growable array of `T` with a declared null
//! value. A [`ColumnDescriptor`] binds a buffer to a [`ValueParser`] plus the
//! per-column load settings (null marker, separator and quote overrides). The
//! loader borrows descriptors mutably for the whole load and hands each one
//! to exactly one worker per round.
//!
//! # Example
//!
//! ```
//! use ironload::*;
//!
//! let mut qty = ColumnBuffer::<i32>::new();
//! let mut name = ColumnBuffer::<Option<String>>::new();
//! let columns = vec![
//!     ColumnDescriptor::new("qty", FromStrParser::<i32>::new("int"), &mut qty)
//!         .with_null_marker("NULL"),
//!     ColumnDescriptor::new("name", TextParser, &mut name),
//! ];
//! assert_eq!(columns.len(), 2);
//! ```

use std::collections::TryReserveError;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Types with a distinguished "no value" representation.
pub trait NullValue {
    fn null_value() -> Self;
}

macro_rules! impl_null_min {
    ($($t:ty),*) => {$(
        impl NullValue for $t {
            fn null_value() -> Self {
                <$t>::MIN
            }
        }
    )*};
}

macro_rules! impl_null_max {
    ($($t:ty),*) => {$(
        impl NullValue for $t {
            fn null_value() -> Self {
                <$t>::MAX
            }
        }
    )*};
}

impl_null_min!(i8, i16, i32, i64, i128, isize);
impl_null_max!(u8, u16, u32, u64, u128, usize);

impl NullValue for f32 {
    fn null_value() -> Self {
        f32::NAN
    }
}

impl NullValue for f64 {
    fn null_value() -> Self {
        f64::NAN
    }
}

impl<T> NullValue for Option<T> {
    fn null_value() -> Self {
        None
    }
}

/// Counts how many threads are inside a column's append path at once.
///
/// Attach one to a [`ColumnBuffer`] with [`ColumnBuffer::with_probe`]; after a
/// load, [`AppendProbe::max_concurrent`] must be at most 1.
#[derive(Debug, Default)]
pub struct AppendProbe {
    active: AtomicUsize,
    max_active: AtomicUsize,
    entries: AtomicUsize,
}

impl AppendProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Highest number of simultaneous entries observed.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Total number of entries (one per column per round).
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }

    pub(crate) fn enter(&self) -> ProbeGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.entries.fetch_add(1, Ordering::SeqCst);
        ProbeGuard(self)
    }
}

pub(crate) struct ProbeGuard<'a>(&'a AppendProbe);

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Growable typed column with a declared null value.
///
/// `has_nulls` starts out `false` and flips to `true` on the first null
/// appended; it never flips back.
#[derive(Clone)]
pub struct ColumnBuffer<T> {
    values: Vec<T>,
    null: T,
    no_nulls: bool,
    probe: Option<Arc<AppendProbe>>,
}

impl<T: NullValue> ColumnBuffer<T> {
    /// Empty column using the type's [`NullValue`].
    pub fn new() -> Self {
        Self::with_null(T::null_value())
    }
}

impl<T: NullValue> Default for ColumnBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ColumnBuffer<T> {
    /// Empty column with an explicit null value.
    pub fn with_null(null: T) -> Self {
        Self {
            values: Vec::new(),
            null,
            no_nulls: true,
            probe: None,
        }
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<AppendProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.values.get(idx)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn null_value(&self) -> &T {
        &self.null
    }

    /// Whether a null has ever been appended.
    pub fn has_nulls(&self) -> bool {
        !self.no_nulls
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    fn try_grow(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.values.try_reserve(additional)
    }

    fn push(&mut self, value: T) {
        self.values.push(value);
    }

    fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Drop the values at `start + i` for which `keep[i]` is false.
    fn compact_from(&mut self, start: usize, keep: &[bool]) {
        let mut write = start;
        for read in start..self.values.len() {
            if keep.get(read - start).copied().unwrap_or(true) {
                self.values.swap(write, read);
                write += 1;
            }
        }
        self.values.truncate(write);
    }
}

impl<T: Clone> ColumnBuffer<T> {
    fn push_null(&mut self) {
        self.no_nulls = false;
        self.values.push(self.null.clone());
    }
}

impl<T: PartialEq> ColumnBuffer<T> {
    /// Whether the value at `idx` equals the declared null.
    ///
    /// Always false for NaN nulls; compare with `f64::is_nan` instead.
    pub fn is_null(&self, idx: usize) -> bool {
        self.values.get(idx).is_some_and(|v| *v == self.null)
    }
}

impl<T: fmt::Debug> fmt::Debug for ColumnBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnBuffer")
            .field("len", &self.values.len())
            .field("null", &self.null)
            .field("has_nulls", &!self.no_nulls)
            .finish()
    }
}

/// Converts one field's text to a typed value.
///
/// Returning `None` marks the text as unparseable; the loader then stores the
/// column's null and reports a conversion error for the row.
pub trait ValueParser: Send + Sync {
    type Value;

    fn parse(&self, raw: &str) -> Option<Self::Value>;

    /// Type name used in diagnostics (`'int' expected in 'abc'`).
    fn type_name(&self) -> &str;
}

/// Parser for any [`FromStr`] type. Surrounding ASCII whitespace is ignored.
pub struct FromStrParser<T> {
    type_name: String,
    _t: PhantomData<fn() -> T>,
}

impl<T: FromStr> FromStrParser<T> {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            _t: PhantomData,
        }
    }
}

impl<T: FromStr> ValueParser for FromStrParser<T> {
    type Value = T;

    fn parse(&self, raw: &str) -> Option<T> {
        raw.trim_ascii().parse().ok()
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Parser for text columns; every field is accepted verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl ValueParser for TextParser {
    type Value = Option<String>;

    fn parse(&self, raw: &str) -> Option<Option<String>> {
        Some(Some(raw.to_owned()))
    }

    fn type_name(&self) -> &str {
        "varchar"
    }
}

/// Parser for boolean columns accepting `true/false`, `t/f`, `yes/no` and
/// `1/0`, case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolParser;

impl ValueParser for BoolParser {
    type Value = Option<bool>;

    fn parse(&self, raw: &str) -> Option<Option<bool>> {
        let raw = raw.trim_ascii();
        const TRUE: [&str; 4] = ["true", "t", "yes", "1"];
        const FALSE: [&str; 4] = ["false", "f", "no", "0"];
        if TRUE.iter().any(|t| raw.eq_ignore_ascii_case(t)) {
            Some(Some(true))
        } else if FALSE.iter().any(|f| raw.eq_ignore_ascii_case(f)) {
            Some(Some(false))
        } else {
            None
        }
    }

    fn type_name(&self) -> &str {
        "boolean"
    }
}

/// Parser backed by a closure.
pub struct FnParser<F, V> {
    type_name: String,
    f: F,
    _value: PhantomData<fn() -> V>,
}

/// Build a [`ValueParser`] from a closure.
///
/// ```
/// use ironload::parser_fn;
/// use ironload::ValueParser;
///
/// let cents = parser_fn("money", |s: &str| {
///     let (whole, frac) = s.split_once('.')?;
///     Some(whole.parse::<i64>().ok()? * 100 + frac.parse::<i64>().ok()?)
/// });
/// assert_eq!(cents.parse("12.34"), Some(1234));
/// ```
pub fn parser_fn<F, V>(type_name: impl Into<String>, f: F) -> FnParser<F, V>
where
    F: Fn(&str) -> Option<V> + Send + Sync,
{
    FnParser {
        type_name: type_name.into(),
        f,
        _value: PhantomData,
    }
}

impl<F, V> ValueParser for FnParser<F, V>
where
    F: Fn(&str) -> Option<V> + Send + Sync,
{
    type Value = V;

    fn parse(&self, raw: &str) -> Option<V> {
        (self.f)(raw)
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Type-erased view of a parser bound to its column buffer.
pub(crate) trait ColumnSink: Send {
    fn len(&self) -> usize;
    fn try_grow(&mut self, additional: usize) -> Result<(), TryReserveError>;
    /// Parse and append; `false` when the text does not parse (nothing appended).
    fn append_text(&mut self, text: &str) -> bool;
    fn append_null(&mut self);
    fn truncate(&mut self, len: usize);
    fn compact_from(&mut self, start: usize, keep: &[bool]);
    fn type_name(&self) -> &str;
    fn probe(&self) -> Option<Arc<AppendProbe>>;
}

struct Bound<'a, P: ValueParser> {
    parser: P,
    target: &'a mut ColumnBuffer<P::Value>,
}

impl<P> ColumnSink for Bound<'_, P>
where
    P: ValueParser,
    P::Value: Clone + Send,
{
    fn len(&self) -> usize {
        self.target.len()
    }

    fn try_grow(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.target.try_grow(additional)
    }

    fn append_text(&mut self, text: &str) -> bool {
        match self.parser.parse(text) {
            Some(v) => {
                self.target.push(v);
                true
            }
            None => false,
        }
    }

    fn append_null(&mut self) {
        self.target.push_null();
    }

    fn truncate(&mut self, len: usize) {
        self.target.truncate(len);
    }

    fn compact_from(&mut self, start: usize, keep: &[bool]) {
        self.target.compact_from(start, keep);
    }

    fn type_name(&self) -> &str {
        self.parser.type_name()
    }

    fn probe(&self) -> Option<Arc<AppendProbe>> {
        self.target.probe.clone()
    }
}

/// One load target: name, per-column settings and the bound column buffer.
pub struct ColumnDescriptor<'a> {
    name: String,
    null_marker: Option<String>,
    separator: Option<String>,
    quote: Option<char>,
    pub(crate) sink: Box<dyn ColumnSink + 'a>,
}

impl<'a> ColumnDescriptor<'a> {
    pub fn new<P>(name: impl Into<String>, parser: P, target: &'a mut ColumnBuffer<P::Value>) -> Self
    where
        P: ValueParser + 'a,
        P::Value: Clone + Send,
    {
        Self {
            name: name.into(),
            null_marker: None,
            separator: None,
            quote: None,
            sink: Box::new(Bound { parser, target }),
        }
    }

    /// Text that denotes a null in this column (matched case-insensitively on
    /// unquoted fields).
    #[must_use]
    pub fn with_null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = Some(marker.into());
        self
    }

    /// Separator that terminates this column's field, overriding the load's
    /// column separator. Ignored on the last column.
    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Quote character for this column, overriding the load's quote.
    #[must_use]
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = Some(quote);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn null_marker(&self) -> Option<&str> {
        self.null_marker.as_deref()
    }

    pub fn separator(&self) -> Option<&str> {
        self.separator.as_deref()
    }

    pub fn quote(&self) -> Option<char> {
        self.quote
    }

    pub fn type_name(&self) -> &str {
        self.sink.type_name()
    }

    /// Rows currently stored in the bound buffer.
    pub fn len(&self) -> usize {
        self.sink.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ColumnDescriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("null_marker", &self.null_marker)
            .field("separator", &self.separator)
            .field("quote", &self.quote)
            .finish()
    }
}
