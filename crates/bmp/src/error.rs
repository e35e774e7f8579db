//! Error types for the transmission engine.

use bmp_chunk::ChunkError;
use bmp_core::{CoreError, PeerId};
use bmp_ledger::LedgerError;
use thiserror::Error;

/// Errors reported by a [`crate::PeerDirectory`].
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No route to the peer.
    #[error("peer not found: {0}")]
    UnknownPeer(PeerId),

    /// The peer's inbound channel is gone.
    #[error("peer disconnected: {0}")]
    Disconnected(PeerId),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors that can occur during engine operations.
///
/// Inbound failures (bad signatures, failed decryption, observer errors) are
/// logged and never surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("peer not found: {0}")]
    UnknownPeer(PeerId),

    #[error("cannot stream an empty payload")]
    EmptyStream,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
