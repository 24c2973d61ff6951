//! Fixed-size chunking over a sequential record stream

use super::Chunk;

/// Lazily cuts a fallible record iterator into chunks of `chunk_size`
///
/// The last chunk may be shorter. An exhausted source yields no trailing
/// empty chunk. The source is not restartable: once the underlying iterator
/// ends or fails, every later call returns `Ok(None)`.
pub struct ChunkSource<I> {
    records: I,
    chunk_size: usize,
    next_index: usize,
    records_read: usize,
    finished: bool,
}

impl<I, R, E> ChunkSource<I>
where
    I: Iterator<Item = Result<R, E>>,
{
    /// Wrap a record stream; `chunk_size` of 0 is treated as 1
    pub fn new(records: I, chunk_size: usize) -> Self {
        Self {
            records,
            chunk_size: chunk_size.max(1),
            next_index: 0,
            records_read: 0,
            finished: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Records pulled from the stream so far
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Pull the next chunk
    ///
    /// A stream error is returned as-is and ends the source; records
    /// already buffered for the failing chunk are discarded.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk<R>>, E> {
        if self.finished {
            return Ok(None);
        }

        let first_record = self.records_read;
        let mut records = Vec::with_capacity(self.chunk_size);

        while records.len() < self.chunk_size {
            match self.records.next() {
                Some(Ok(record)) => {
                    records.push(record);
                    self.records_read += 1;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Err(e);
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if records.is_empty() {
            return Ok(None);
        }

        let index = self.next_index;
        self.next_index += 1;

        Ok(Some(Chunk {
            index,
            first_record,
            records,
        }))
    }
}

impl<I, R, E> Iterator for ChunkSource<I>
where
    I: Iterator<Item = Result<R, E>>,
{
    type Item = Result<Chunk<R>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}
