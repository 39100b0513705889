//! Assertions for load results.

use std::fmt::Debug;

use crate::column::ColumnBuffer;
use crate::error::ErrorKind;
use crate::sink::Rejects;

/// Assert that a column holds exactly `expected`, in order.
///
/// # Panics
///
/// Panics with the first differing row if the contents differ.
///
/// ```
/// use ironload::ColumnBuffer;
/// use ironload::testing::assert_column_eq;
///
/// let col = ColumnBuffer::<i32>::new();
/// assert_column_eq(&col, &[]);
/// ```
pub fn assert_column_eq<T: Debug + PartialEq>(column: &ColumnBuffer<T>, expected: &[T]) {
    let actual = column.values();
    assert_eq!(
        actual.len(),
        expected.len(),
        "Column length mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "Column mismatch at row {i}:\n  Expected: {e:?}\n  Actual: {a:?}");
    }
}

/// Assert that all given column lengths are equal to `rows`.
///
/// # Panics
///
/// Panics naming the first column whose length differs.
pub fn assert_columns_aligned(lengths: &[(&str, usize)], rows: usize) {
    for (name, len) in lengths {
        assert_eq!(*len, rows, "Column {name} has {len} rows, expected {rows}");
    }
}

/// Assert the kinds and lines of the rejected entries, in order.
///
/// # Panics
///
/// Panics if the table differs from `expected`.
pub fn assert_rejects(rejects: &Rejects, expected: &[(ErrorKind, u64)]) {
    let actual: Vec<(ErrorKind, u64)> = rejects
        .entries()
        .iter()
        .map(|d| (d.kind, d.line.unwrap_or(0)))
        .collect();
    assert_eq!(
        actual, expected,
        "Rejects mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}\n  Entries: {:#?}",
        rejects.entries()
    );
}
