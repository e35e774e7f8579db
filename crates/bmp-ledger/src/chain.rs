//! The blockchain: a single-writer, append-only log of mined blocks.

use bmp_core::unix_timestamp;
use tracing::{debug, info};

use crate::block::{check_difficulty, Block, CancelFlag, ZERO_HASH};
use crate::entry::{BlockData, LedgerEntry};
use crate::error::{LedgerError, Result};

/// Default proof-of-work difficulty.
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// The ledger.
///
/// Always holds at least the genesis block. Blocks are never removed or
/// reordered; entries accumulate in `pending` until mined.
#[derive(Debug, Clone)]
pub struct Blockchain {
    pub(crate) chain: Vec<Block>,
    pub(crate) pending: Vec<LedgerEntry>,
    pub(crate) difficulty: u32,
}

impl Blockchain {
    /// Create a ledger and mine its genesis block.
    pub fn new(difficulty: u32) -> Result<Self> {
        check_difficulty(difficulty)?;
        let mut genesis = Block::new(0, unix_timestamp(), BlockData::genesis(), ZERO_HASH)?;
        genesis.mine(difficulty)?;
        debug!(hash = %genesis.hash, difficulty, "mined genesis block");

        Ok(Self {
            chain: vec![genesis],
            pending: Vec::new(),
            difficulty,
        })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Entries waiting for the next block.
    pub fn pending(&self) -> &[LedgerEntry] {
        &self.pending
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: a ledger holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn latest_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// Buffer an entry for the next block.
    ///
    /// Entries with a NaN or infinite timestamp are refused; JSON has no
    /// encoding for them and a saved ledger holding one could not be loaded.
    pub fn add(&mut self, entry: LedgerEntry) -> Result<()> {
        if let Some(timestamp) = entry.timestamp() {
            if !timestamp.is_finite() {
                return Err(LedgerError::NonFiniteTimestamp);
            }
        }
        self.pending.push(entry);
        Ok(())
    }

    /// Mine every pending entry into one new block.
    ///
    /// Returns `None` without touching the chain when nothing is pending.
    /// Expected cost grows as `16^difficulty` hash attempts.
    pub fn mine_pending(&mut self) -> Result<Option<Block>> {
        self.mine_pending_inner(None)
    }

    /// Like [`Blockchain::mine_pending`], but stops when `cancel` is set.
    ///
    /// A cancelled attempt returns [`LedgerError::MiningCancelled`] and
    /// leaves the pending entries in place for a later attempt.
    pub fn mine_pending_with(&mut self, cancel: &CancelFlag) -> Result<Option<Block>> {
        self.mine_pending_inner(Some(cancel))
    }

    fn mine_pending_inner(&mut self, cancel: Option<&CancelFlag>) -> Result<Option<Block>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let mut block = Block::new(
            self.chain.len() as u64,
            unix_timestamp(),
            BlockData::Batch {
                messages: self.pending.clone(),
            },
            self.latest_block().hash.clone(),
        )?;
        match cancel {
            Some(flag) => block.mine_with(self.difficulty, flag)?,
            None => block.mine(self.difficulty)?,
        }

        info!(
            index = block.index,
            entries = self.pending.len(),
            nonce = block.nonce,
            "mined block"
        );
        self.pending.clear();
        self.chain.push(block.clone());
        Ok(Some(block))
    }

    /// Check every block, reporting the first fault found.
    ///
    /// Each block must sit at its own index, link to its predecessor (the
    /// genesis block links to the zero hash), hash to its stored hash and
    /// meet the difficulty.
    pub fn verify_chain(&self) -> Result<()> {
        if self.chain.is_empty() {
            return Err(LedgerError::EmptyChain);
        }

        for (position, block) in self.chain.iter().enumerate() {
            if block.index != position as u64 {
                return Err(LedgerError::IndexMismatch {
                    position,
                    index: block.index,
                });
            }

            let expected_previous = match position {
                0 => ZERO_HASH,
                _ => self.chain[position - 1].hash.as_str(),
            };
            if block.previous_hash != expected_previous {
                return Err(LedgerError::BrokenLink { index: block.index });
            }

            if block.hash != block.calculate_hash()? {
                return Err(LedgerError::HashMismatch { index: block.index });
            }

            if !block.meets_difficulty(self.difficulty) {
                return Err(LedgerError::InsufficientWork {
                    index: block.index,
                    difficulty: self.difficulty,
                });
            }
        }
        Ok(())
    }

    /// Whether the whole chain is intact.
    pub fn validate(&self) -> bool {
        match self.verify_chain() {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "chain validation failed");
                false
            }
        }
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|b| b.hash == hash)
    }

    pub fn get_by_index(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.chain.get(i))
    }

    /// All entries of all non-genesis blocks, in chain order.
    pub fn messages(&self) -> Vec<LedgerEntry> {
        self.chain
            .iter()
            .skip(1)
            .flat_map(|b| b.entries().iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bmp_core::{Address, MessageId, Recipient};

    fn entry(n: u32) -> LedgerEntry {
        LedgerEntry::Message {
            id: MessageId::new(format!("m{}", n)),
            sender: Address::new("alice"),
            recipient: Recipient::Direct("bob".into()),
            timestamp: n as f64,
        }
    }

    #[test]
    fn test_new_chain_has_valid_genesis() {
        let chain = Blockchain::new(2).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(chain.validate());
        let genesis = &chain.chain()[0];
        assert!(genesis.hash.starts_with("00"));
        assert_eq!(genesis.previous_hash, ZERO_HASH);
        assert_eq!(genesis.data, BlockData::genesis());
        assert!(chain.messages().is_empty());
    }

    #[test]
    fn test_mine_pending_empty_is_noop() {
        let mut chain = Blockchain::new(1).unwrap();
        assert!(chain.mine_pending().unwrap().is_none());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_mine_pending_batches_all_entries() {
        let mut chain = Blockchain::new(1).unwrap();
        for n in 0..3 {
            chain.add(entry(n)).unwrap();
        }
        let block = chain.mine_pending().unwrap().unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(block.index, 1);
        assert_eq!(block.entries().len(), 3);
        assert_eq!(block.previous_hash, chain.chain()[0].hash);
        assert!(chain.pending().is_empty());
        assert!(chain.validate());
        assert_eq!(chain.latest_block(), &block);
    }

    #[test]
    fn test_messages_flatten_in_order() {
        let mut chain = Blockchain::new(1).unwrap();
        chain.add(entry(1)).unwrap();
        chain.mine_pending().unwrap();
        chain.add(entry(2)).unwrap();
        chain.add(entry(3)).unwrap();
        chain.mine_pending().unwrap();

        let ids: Vec<_> = chain
            .messages()
            .iter()
            .filter_map(|e| e.message_id().cloned())
            .collect();
        assert_eq!(
            ids,
            vec![MessageId::new("m1"), MessageId::new("m2"), MessageId::new("m3")]
        );
    }

    #[test]
    fn test_tampered_data_invalidates() {
        let mut chain = Blockchain::new(1).unwrap();
        chain.add(entry(1)).unwrap();
        chain.mine_pending().unwrap();

        chain.chain[1].data = BlockData::Batch {
            messages: vec![entry(99)],
        };
        assert!(!chain.validate());
        assert!(matches!(
            chain.verify_chain(),
            Err(LedgerError::HashMismatch { index: 1 })
        ));
    }

    #[test]
    fn test_tampered_previous_hash_invalidates() {
        let mut chain = Blockchain::new(1).unwrap();
        chain.add(entry(1)).unwrap();
        chain.mine_pending().unwrap();

        chain.chain[1].previous_hash = "f".repeat(64);
        assert!(matches!(
            chain.verify_chain(),
            Err(LedgerError::BrokenLink { index: 1 })
        ));
    }

    #[test]
    fn test_tampered_genesis_invalidates() {
        let mut chain = Blockchain::new(1).unwrap();
        chain.chain[0].data = BlockData::Entry(LedgerEntry::System {
            message: "rewritten".into(),
        });
        assert!(!chain.validate());
    }

    #[test]
    fn test_insufficient_work_invalidates() {
        let mut chain = Blockchain::new(1).unwrap();
        chain.difficulty = 12;
        assert!(matches!(
            chain.verify_chain(),
            Err(LedgerError::InsufficientWork { index: 0, difficulty: 12 })
        ));
    }

    #[test]
    fn test_non_finite_timestamp_rejected() {
        let mut chain = Blockchain::new(1).unwrap();
        for timestamp in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = chain.add(LedgerEntry::Received {
                id: MessageId::new("bad"),
                sender: Address::new("mallory"),
                timestamp,
            });
            assert!(matches!(result, Err(LedgerError::NonFiniteTimestamp)));
        }
        assert!(chain.pending().is_empty());

        chain
            .add(LedgerEntry::System {
                message: "no timestamp".into(),
            })
            .unwrap();
        assert_eq!(chain.pending().len(), 1);
    }

    #[test]
    fn test_lookup_by_hash_and_index() {
        let mut chain = Blockchain::new(1).unwrap();
        chain.add(entry(1)).unwrap();
        let block = chain.mine_pending().unwrap().unwrap();

        assert_eq!(chain.get_by_hash(&block.hash), Some(&block));
        assert_eq!(chain.get_by_index(1), Some(&block));
        assert!(chain.get_by_index(2).is_none());
        assert!(chain.get_by_hash("nope").is_none());
    }

    #[test]
    fn test_cancelled_mining_keeps_pending() {
        let mut chain = Blockchain::new(0).unwrap();
        chain.difficulty = 12;
        chain.add(entry(1)).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        assert!(matches!(
            chain.mine_pending_with(&cancel),
            Err(LedgerError::MiningCancelled)
        ));
        assert_eq!(chain.pending().len(), 1);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_invalid_difficulty_rejected() {
        assert!(matches!(
            Blockchain::new(65),
            Err(LedgerError::InvalidDifficulty(65))
        ));
    }
}
