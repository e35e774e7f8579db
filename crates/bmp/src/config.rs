//! Engine configuration.

use std::time::Duration;

use bmp_chunk::{ReassemblyConfig, DEFAULT_CHUNK_SIZE};
use bmp_ledger::DEFAULT_DIFFICULTY;

/// Retry policy for unacknowledged direct messages.
#[derive(Debug, Clone)]
pub struct AckConfig {
    /// Time to wait for an acknowledgment before resending.
    pub timeout: Duration,
    /// Resends before a message is given up on.
    pub max_retries: u32,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }
}

/// Configuration for the [`crate::TransmissionEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether [`crate::TransmissionEngine::send`] encrypts.
    pub encrypt_by_default: bool,
    /// Chunk size for outbound streams.
    pub chunk_size: usize,
    /// Difficulty of a ledger the engine creates itself.
    pub ledger_difficulty: u32,
    /// Inbound text message ids remembered for duplicate suppression.
    pub dedup_window: usize,
    pub ack: AckConfig,
    pub reassembly: ReassemblyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encrypt_by_default: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ledger_difficulty: DEFAULT_DIFFICULTY,
            dedup_window: 1024,
            ack: AckConfig::default(),
            reassembly: ReassemblyConfig::default(),
        }
    }
}
