//! # BMP Chunk
//!
//! Transport of payloads larger than one message: [`DataChunker`] splits a
//! payload into numbered chunks and [`ChunkReassembler`] rebuilds it from
//! chunks arriving in any order, duplicates included.

pub mod chunker;
pub mod error;
pub mod reassembly;

pub use chunker::{chunk, Chunk, Chunks, DataChunker, DEFAULT_CHUNK_SIZE};
pub use error::{ChunkError, Result};
pub use reassembly::{ChunkReassembler, ReassemblyConfig};
