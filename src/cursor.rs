//! Refillable byte windows over load inputs.
//!
//! The loader never reads from an input directly. It scans the unread part of
//! a [`ByteCursor`]'s window, consumes the bytes of complete records and asks
//! for a [`refill`](ByteCursor::refill) when no complete record is left.
//! Refills keep the unread bytes and append new ones behind them.

use anyhow::Context;
use std::collections::TryReserveError;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::io::compression::auto_detect_reader;

/// Default window size (1 MiB).
pub const DEFAULT_CAPACITY: usize = 1 << 20;

/// A window of raw bytes with "give me more" semantics.
pub trait ByteCursor: Send {
    /// Offset of the first unread byte in the window.
    fn position(&self) -> usize;

    /// Number of valid bytes in the window (read and unread).
    fn len(&self) -> usize;

    /// Current allocation of the window.
    fn capacity(&self) -> usize;

    /// Whether the underlying input is exhausted. Unread bytes may remain.
    fn at_end_of_input(&self) -> bool;

    /// The unread bytes, `position()..len()`.
    fn window(&self) -> &[u8];

    /// Mark `n` unread bytes as read.
    fn consume(&mut self, n: usize);

    /// Keep the unread bytes, make room for at least `hint` more (growing the
    /// window if needed) and read new bytes behind them.
    ///
    /// Returns the number of bytes read; `0` means end of input.
    fn refill(&mut self, hint: usize) -> io::Result<usize>;

    fn is_empty(&self) -> bool {
        self.position() >= self.len()
    }
}

/// [`ByteCursor`] over any [`Read`] implementation.
pub struct ReadCursor<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
    eof: bool,
    /// Upper bound on the bytes requested from `reader` per refill.
    max_read: usize,
}

impl<R: Read + Send> ReadCursor<R> {
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader,
            buf: vec![0; capacity.max(1)],
            pos: 0,
            len: 0,
            eof: false,
            max_read: usize::MAX,
        }
    }

    /// Read at most `max_read` bytes per refill. Small values force many
    /// refills, which exercises record roll-over.
    #[must_use]
    pub fn with_max_read(mut self, max_read: usize) -> Self {
        self.max_read = max_read.max(1);
        self
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn compact(&mut self) {
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.len, 0);
            self.len -= self.pos;
            self.pos = 0;
        }
    }

    fn grow_to(&mut self, size: usize) -> Result<(), TryReserveError> {
        if size > self.buf.len() {
            self.buf.try_reserve_exact(size - self.buf.len())?;
            self.buf.resize(size, 0);
        }
        Ok(())
    }
}

impl ReadCursor<io::Cursor<Vec<u8>>> {
    /// Cursor over an in-memory input.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let capacity = bytes.len().clamp(1, DEFAULT_CAPACITY);
        Self::with_capacity(io::Cursor::new(bytes), capacity)
    }
}

impl ReadCursor<Box<dyn Read + Send>> {
    /// Open a file, transparently decompressing it when its extension or magic
    /// bytes identify a registered codec.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let reader = auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        Ok(Self::new(reader))
    }
}

impl<R: Read + Send> ByteCursor for ReadCursor<R> {
    fn position(&self) -> usize {
        self.pos
    }

    fn len(&self) -> usize {
        self.len
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn at_end_of_input(&self) -> bool {
        self.eof
    }

    fn window(&self) -> &[u8] {
        &self.buf[self.pos..self.len]
    }

    fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.len);
    }

    fn refill(&mut self, hint: usize) -> io::Result<usize> {
        if self.eof {
            return Ok(0);
        }
        self.compact();
        let wanted = self.len + hint.max(1);
        self.grow_to(wanted)
            .map_err(|e| io::Error::new(io::ErrorKind::OutOfMemory, e))?;

        let end = self.buf.len().min(self.len.saturating_add(self.max_read));
        loop {
            match self.reader.read(&mut self.buf[self.len..end]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(n) => {
                    self.len += n;
                    log::trace!("refill read {n} bytes, window now {} bytes", self.len);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refill_keeps_unread_bytes_in_front() {
        let mut cur = ReadCursor::with_capacity(io::Cursor::new(b"abcdef".to_vec()), 4);
        assert_eq!(cur.refill(4).unwrap(), 4);
        assert_eq!(cur.window(), b"abcd");
        cur.consume(3);
        cur.refill(4).unwrap();
        assert_eq!(cur.window(), b"def");
        assert_eq!(cur.position(), 0);
        assert_eq!(cur.refill(4).unwrap(), 0);
        assert!(cur.at_end_of_input());
        assert_eq!(cur.window(), b"def");
    }

    #[test]
    fn refill_grows_when_asked_for_more_than_fits() {
        let mut cur = ReadCursor::with_capacity(io::Cursor::new(vec![b'x'; 64]), 8);
        cur.refill(8).unwrap();
        cur.refill(32).unwrap();
        assert!(cur.capacity() >= 40);
        assert!(cur.window().len() > 8);
    }
}
