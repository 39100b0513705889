//! Testing utilities for loads.
//!
//! - **Builders**: produce delimited inputs with correct quoting
//! - **Fixtures**: starved cursors that force many refills, temporary
//!   (optionally compressed) input files, a small sample table
//! - **Assertions**: compare columns and rejects with readable failures
//!
//! # Quick Start
//!
//! ```
//! use ironload::*;
//! use ironload::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let text = numbered_rows(100, 2);
//! let mut a = ColumnBuffer::<u32>::new();
//! let mut b = ColumnBuffer::<u32>::new();
//! let mut columns = vec![
//!     ColumnDescriptor::new("a", FromStrParser::<u32>::new("int"), &mut a),
//!     ColumnDescriptor::new("b", FromStrParser::<u32>::new("int"), &mut b),
//! ];
//! let rows = Loader::new(LoadOptions::default()).run(&mut columns, &mut starved_cursor(text, 7))?;
//! drop(columns);
//!
//! assert_eq!(rows, 100);
//! assert_column_eq(&a, &(0..100).map(|r| r * 2).collect::<Vec<_>>());
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
