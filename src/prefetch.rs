//! Double-buffered chunk source.
//!
//! With prefetching on, a producer thread owns the cursor and fills the next
//! [`RecordChunk`] while the pool works on the current one. Two chunk buffers
//! circulate: filled ones travel to the batch loop, processed ones travel
//! back for reuse. Dropping the consumer side stops the producer at its next
//! hand-off.

use std::io;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{Scope, ScopedJoinHandle};

use crate::batch::RecordChunk;
use crate::cursor::ByteCursor;
use crate::reader::RecordReader;

const BUFFERS: usize = 2;

/// Where the batch loop gets its chunks from.
pub(crate) enum ChunkSource<'s, 'e> {
    Inline {
        reader: RecordReader<'e>,
        cursor: &'e mut dyn ByteCursor,
        spare: Option<RecordChunk>,
    },
    Prefetch {
        full: Receiver<io::Result<RecordChunk>>,
        empty: SyncSender<RecordChunk>,
        _producer: ScopedJoinHandle<'s, ()>,
    },
}

impl<'s, 'e> ChunkSource<'s, 'e> {
    pub(crate) fn inline(reader: RecordReader<'e>, cursor: &'e mut dyn ByteCursor) -> Self {
        Self::Inline {
            reader,
            cursor,
            spare: None,
        }
    }

    /// Start the producer thread inside `scope`.
    pub(crate) fn prefetch<'env>(
        scope: &'s Scope<'s, 'env>,
        mut reader: RecordReader<'e>,
        cursor: &'e mut dyn ByteCursor,
    ) -> io::Result<Self>
    where
        'e: 's,
    {
        let (full_tx, full) = sync_channel::<io::Result<RecordChunk>>(BUFFERS);
        let (empty, empty_rx) = sync_channel::<RecordChunk>(BUFFERS);
        for _ in 0..BUFFERS {
            let _ = empty.send(RecordChunk::default());
        }

        let producer = std::thread::Builder::new()
            .name("ironload-prefetch".into())
            .spawn_scoped(scope, move || {
                while let Ok(mut chunk) = empty_rx.recv() {
                    let filled = reader.fill_chunk(cursor, &mut chunk);
                    let last = filled.is_err() || chunk.finished;
                    if full_tx.send(filled.map(|()| chunk)).is_err() || last {
                        break;
                    }
                }
                log::trace!("prefetch producer finished");
            })?;

        Ok(Self::Prefetch {
            full,
            empty,
            _producer: producer,
        })
    }

    /// The next filled chunk, or `None` once the producer is gone.
    pub(crate) fn next_chunk(&mut self) -> Option<io::Result<RecordChunk>> {
        match self {
            Self::Inline {
                reader,
                cursor,
                spare,
            } => {
                let mut chunk = spare.take().unwrap_or_default();
                Some(reader.fill_chunk(&mut **cursor, &mut chunk).map(|()| chunk))
            }
            Self::Prefetch { full, .. } => full.recv().ok(),
        }
    }

    /// Hand a processed chunk back for reuse.
    pub(crate) fn recycle(&mut self, chunk: RecordChunk) {
        match self {
            Self::Inline { spare, .. } => *spare = Some(chunk),
            Self::Prefetch { empty, .. } => {
                let _ = empty.send(chunk);
            }
        }
    }
}
