//! Input fixtures: starved cursors and on-disk (optionally compressed) files.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::cursor::ReadCursor;
use crate::io::compression::auto_detect_writer;

/// An in-memory cursor that starts tiny and reads at most `max_read` bytes
/// per refill, so records straddle many refills.
///
/// ```
/// use ironload::ByteCursor;
/// use ironload::testing::starved_cursor;
///
/// let mut cur = starved_cursor("a,b\nc,d\n", 3);
/// assert_eq!(cur.refill(64).unwrap(), 3);
/// ```
pub fn starved_cursor(bytes: impl Into<Vec<u8>>, max_read: usize) -> ReadCursor<io::Cursor<Vec<u8>>> {
    ReadCursor::with_capacity(io::Cursor::new(bytes.into()), max_read.max(1)).with_max_read(max_read)
}

/// A file in a private temporary directory. Both are removed on drop.
pub struct TempInput {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl TempInput {
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

/// Write `contents` to a temporary file called `name`, compressing it when
/// the extension names a codec (`.gz`, `.zst`, `.bz2`, `.xz`).
pub fn temp_input(name: &str, contents: &[u8]) -> Result<TempInput> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = auto_detect_writer(file, &path)?;
    writer.write_all(contents)?;
    writer.flush()?;
    drop(writer);
    Ok(TempInput { _dir: dir, path })
}

/// A small order table: `id,customer,amount,note`, with quoting, an embedded
/// record separator and a `\N` null.
#[must_use]
pub fn sample_orders() -> &'static str {
    concat!(
        "1,alice,10.50,first order\n",
        "2,bob,3.25,\"gift, wrapped\"\n",
        "3,carol,\\N,\"two\nlines\"\n",
        "4,dave,99.99,\"he said \"\"now\"\"\"\n",
    )
}
