//! JSON persistence of the ledger.
//!
//! Stored hashes are loaded verbatim and never recomputed or re-mined, so a
//! tampered document loads fine and is caught by [`Blockchain::validate`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::block::{check_difficulty, Block};
use crate::chain::Blockchain;
use crate::entry::LedgerEntry;
use crate::error::{LedgerError, Result};

/// The persisted form of a [`Blockchain`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    pub difficulty: u32,
    pub chain: Vec<Block>,
    #[serde(default, alias = "pending_data")]
    pub pending: Vec<LedgerEntry>,
}

impl Blockchain {
    pub fn to_document(&self) -> LedgerDocument {
        LedgerDocument {
            difficulty: self.difficulty,
            chain: self.chain.clone(),
            pending: self.pending.clone(),
        }
    }

    /// Rebuild a ledger from a document without re-mining.
    ///
    /// Fails only on structural problems (no blocks, impossible difficulty).
    pub fn from_document(document: LedgerDocument) -> Result<Self> {
        check_difficulty(document.difficulty)?;
        if document.chain.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        Ok(Self {
            chain: document.chain,
            pending: document.pending,
            difficulty: document.difficulty,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_document(serde_json::from_str(json)?)
    }

    /// Write the ledger to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), blocks = self.len(), "saved ledger");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let chain = Self::from_json(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), blocks = chain.len(), "loaded ledger");
        Ok(chain)
    }
}
