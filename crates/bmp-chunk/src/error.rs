//! Error types for chunking and reassembly.

use thiserror::Error;

/// Errors raised by the chunk codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be positive")]
    InvalidChunkSize,

    /// The payload would need more chunks than a `u32` sequence can number.
    #[error("{len} bytes at chunk size {chunk_size} exceeds the maximum chunk count")]
    TooManyChunks { len: usize, chunk_size: usize },

    #[error("chunk total must be positive")]
    InvalidTotal,

    #[error("sequence {sequence} out of range for total {total}")]
    SequenceOutOfRange { sequence: u32, total: u32 },

    /// A chunk disagrees with the total announced by earlier chunks of its stream.
    #[error("stream expects {expected} chunks, chunk claims {actual}")]
    TotalMismatch { expected: u32, actual: u32 },

    #[error("stream buffer of {size} bytes exceeds limit of {max}")]
    StreamTooLarge { size: usize, max: usize },
}

/// Result type for chunk operations.
pub type Result<T> = std::result::Result<T, ChunkError>;
