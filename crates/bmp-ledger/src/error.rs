//! Error types for the ledger.

use thiserror::Error;

/// Errors raised while mining, validating or persisting the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A SHA-256 hex digest has only 64 characters to satisfy.
    #[error("difficulty {0} exceeds the 64 characters of a block hash")]
    InvalidDifficulty(u32),

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("nonce space exhausted for block {0}")]
    NonceExhausted(u64),

    #[error("block {index}: stored hash does not match its contents")]
    HashMismatch { index: u64 },

    #[error("block {index}: previous_hash does not match the preceding block")]
    BrokenLink { index: u64 },

    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: u32 },

    #[error("block at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: u64 },

    #[error("entry timestamp is not a finite number")]
    NonFiniteTimestamp,

    #[error("ledger has no genesis block")]
    EmptyChain,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
