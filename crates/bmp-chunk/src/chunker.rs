//! Splitting payloads into fixed-size chunks.

use bmp_core::StreamId;
use bytes::Bytes;

use crate::error::{ChunkError, Result};

/// Default chunk size for text payloads.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// One piece of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub stream_id: StreamId,
    /// Zero-based position.
    pub sequence: u32,
    /// Number of chunks in the stream.
    pub total: u32,
    pub data: Bytes,
}

impl Chunk {
    /// Check the position fields.
    pub fn validate(&self) -> Result<()> {
        if self.total == 0 {
            return Err(ChunkError::InvalidTotal);
        }
        if self.sequence >= self.total {
            return Err(ChunkError::SequenceOutOfRange {
                sequence: self.sequence,
                total: self.total,
            });
        }
        Ok(())
    }

    pub fn is_last(&self) -> bool {
        self.sequence.saturating_add(1) == self.total
    }
}

/// Splits payloads into chunks of at most `chunk_size` bytes.
#[derive(Debug, Clone, Copy)]
pub struct DataChunker {
    chunk_size: usize,
}

impl DataChunker {
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ChunkError::InvalidChunkSize);
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks `len` bytes split into: `ceil(len / chunk_size)`.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_size)
    }

    /// Chunk `data` under a stream id derived from the payload itself.
    ///
    /// Pure: the same input always yields the same sequence.
    pub fn chunk<'a>(&self, data: &'a [u8]) -> Result<Chunks<'a>> {
        self.chunk_stream(StreamId::for_payload(data), data)
    }

    /// Chunk `data` under the given stream id.
    pub fn chunk_stream<'a>(&self, stream_id: StreamId, data: &'a [u8]) -> Result<Chunks<'a>> {
        let total = u32::try_from(self.chunk_count(data.len())).map_err(|_| {
            ChunkError::TooManyChunks {
                len: data.len(),
                chunk_size: self.chunk_size,
            }
        })?;
        Ok(Chunks {
            stream_id,
            pieces: data.chunks(self.chunk_size),
            next: 0,
            total,
        })
    }
}

impl Default for DataChunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Chunk `data` into pieces of `chunk_size` bytes.
pub fn chunk(data: &[u8], chunk_size: usize) -> Result<Chunks<'_>> {
    DataChunker::new(chunk_size)?.chunk(data)
}

/// Lazy iterator over the chunks of one payload, in ascending sequence.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    stream_id: StreamId,
    pieces: std::slice::Chunks<'a, u8>,
    next: u32,
    total: u32,
}

impl Chunks<'_> {
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let piece = self.pieces.next()?;
        let chunk = Chunk {
            stream_id: self.stream_id.clone(),
            sequence: self.next,
            total: self.total,
            data: Bytes::copy_from_slice(piece),
        };
        self.next += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pieces.size_hint()
    }
}

impl ExactSizeIterator for Chunks<'_> {}
