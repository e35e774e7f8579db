//! Blocks and proof-of-work mining.
//!
//! A block's hash is the SHA-256 hex digest of the compact JSON object
//! `{data, index, nonce, previous_hash, timestamp}` with keys in sorted
//! order. Mining increments the nonce in place until the hash starts with
//! `difficulty` zero characters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::entry::{BlockData, LedgerEntry};
use crate::error::{LedgerError, Result};
use crate::merkle::calculate_merkle_root;

/// `previous_hash` of the genesis block.
pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Largest satisfiable difficulty: every character of a SHA-256 hex digest.
pub const MAX_DIFFICULTY: u32 = 64;

/// Nonces tried between checks of a [`CancelFlag`].
pub const MINING_CHECK_INTERVAL: u64 = 4096;

/// Shared flag that asks an in-progress mining loop to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

pub(crate) fn check_difficulty(difficulty: u32) -> Result<()> {
    if difficulty > MAX_DIFFICULTY {
        return Err(LedgerError::InvalidDifficulty(difficulty));
    }
    Ok(())
}

/// Whether `hash` starts with `difficulty` zero characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    hash.len() >= difficulty as usize && hash.bytes().take(difficulty as usize).all(|b| b == b'0')
}

/// The serialized block with the nonce left out, so mining re-hashes without
/// re-serializing the payload.
struct HashPreimage {
    prefix: String,
    suffix: String,
}

impl HashPreimage {
    fn new(block: &Block) -> Result<Self> {
        // Keys in sorted order: data, index, nonce, previous_hash, timestamp.
        // The payload goes through `Value` so nested keys are sorted too.
        let data = serde_json::to_value(&block.data)?;
        let prefix = format!(
            "{{\"data\":{},\"index\":{},\"nonce\":",
            serde_json::to_string(&data)?,
            block.index
        );
        let suffix = format!(
            ",\"previous_hash\":{},\"timestamp\":{}}}",
            serde_json::to_string(&block.previous_hash)?,
            serde_json::to_string(&block.timestamp)?
        );
        Ok(Self { prefix, suffix })
    }

    fn hash(&self, nonce: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prefix.as_bytes());
        hasher.update(nonce.to_string().as_bytes());
        hasher.update(self.suffix.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A single block of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,

    /// Creation time in Unix seconds.
    pub timestamp: f64,

    pub data: BlockData,

    pub previous_hash: String,

    pub nonce: u64,

    /// Stored hash. Loaded verbatim; see [`Block::calculate_hash`].
    pub hash: String,
}

impl Block {
    /// Construct an unmined block (`nonce = 0`) with its hash computed.
    pub fn new(
        index: u64,
        timestamp: f64,
        data: BlockData,
        previous_hash: impl Into<String>,
    ) -> Result<Self> {
        let mut block = Self {
            index,
            timestamp,
            data,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// Recompute the hash from the block's current contents.
    pub fn calculate_hash(&self) -> Result<String> {
        Ok(HashPreimage::new(self)?.hash(self.nonce))
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Search nonces until the hash meets `difficulty`.
    pub fn mine(&mut self, difficulty: u32) -> Result<()> {
        self.mine_inner(difficulty, None)
    }

    /// Like [`Block::mine`], but gives up with [`LedgerError::MiningCancelled`]
    /// once `cancel` is set. The flag is checked every
    /// [`MINING_CHECK_INTERVAL`] nonces.
    pub fn mine_with(&mut self, difficulty: u32, cancel: &CancelFlag) -> Result<()> {
        self.mine_inner(difficulty, Some(cancel))
    }

    fn mine_inner(&mut self, difficulty: u32, cancel: Option<&CancelFlag>) -> Result<()> {
        check_difficulty(difficulty)?;
        let preimage = HashPreimage::new(self)?;
        self.hash = preimage.hash(self.nonce);

        while !meets_difficulty(&self.hash, difficulty) {
            self.nonce = self
                .nonce
                .checked_add(1)
                .ok_or(LedgerError::NonceExhausted(self.index))?;
            if self.nonce % MINING_CHECK_INTERVAL == 0
                && cancel.map_or(false, CancelFlag::is_cancelled)
            {
                return Err(LedgerError::MiningCancelled);
            }
            self.hash = preimage.hash(self.nonce);
        }
        Ok(())
    }

    /// Entries carried by this block (none for genesis).
    pub fn entries(&self) -> &[LedgerEntry] {
        self.data.entries()
    }

    /// Merkle root over the JSON encoding of each entry.
    pub fn entries_merkle_root(&self) -> Result<String> {
        let leaves = self
            .entries()
            .iter()
            .map(serde_json::to_vec)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(calculate_merkle_root(leaves))
    }
}
