//! Test fixtures and helpers.
//!
//! Common setup code for integration tests and benchmarks.

use std::sync::Arc;

use bmp::directory::memory::{MemoryDirectory, MemoryNetwork};
use bmp::{EngineConfig, TransmissionEngine};
use bmp_core::{Address, MessageId, Recipient, Wallet};
use bmp_ledger::{Blockchain, LedgerEntry};
use rand::RngCore;

/// Engine type used by fixtures.
pub type MemoryEngine = TransmissionEngine<MemoryDirectory>;

/// A wallet whose keys derive from `index`, so runs are reproducible.
pub fn seeded_wallet(name: &str, index: u8) -> Wallet {
    let mut signing = [0u8; 32];
    signing[0] = index;
    let mut encryption = [0xee; 32];
    encryption[0] = index;
    Wallet::from_seeds(name, &signing, encryption)
}

/// Distinct seeded wallets named `party-0`, `party-1`, ...
pub fn multi_party_wallets(count: usize) -> Vec<Wallet> {
    (0..count)
        .map(|i| seeded_wallet(&format!("party-{}", i), i as u8))
        .collect()
}

/// Engine configuration with cheap mining.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        ledger_difficulty: 1,
        ..Default::default()
    }
}

/// Two engines on one memory network, each registered with the other.
pub struct EnginePair {
    pub network: Arc<MemoryNetwork>,
    pub alice: MemoryEngine,
    pub bob: MemoryEngine,
}

impl EnginePair {
    pub async fn new() -> Self {
        Self::with_config(fast_config()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let network = MemoryNetwork::new();
        let alice = seeded_wallet("Alice", 1);
        let bob = seeded_wallet("Bob", 2);

        let dir_a = network.join(alice.peer_id()).await;
        let dir_b = network.join(bob.peer_id()).await;
        dir_a.add_peer(bob.as_peer("127.0.0.1", 8001));
        dir_b.add_peer(alice.as_peer("127.0.0.1", 8000));

        // Configs produced here always carry a non-zero chunk size and a
        // legal difficulty, so construction cannot fail.
        let alice = MemoryEngine::new(alice, Arc::new(dir_a), config.clone())
            .unwrap_or_else(|e| panic!("fixture engine: {}", e));
        let bob = MemoryEngine::new(bob, Arc::new(dir_b), config)
            .unwrap_or_else(|e| panic!("fixture engine: {}", e));

        Self {
            network,
            alice,
            bob,
        }
    }
}

/// A `Message` ledger entry numbered `n`.
pub fn sample_entry(n: u32) -> LedgerEntry {
    LedgerEntry::Message {
        id: MessageId::new(format!("message-{:04}", n)),
        sender: Address::new("alice"),
        recipient: Recipient::Direct("bob".into()),
        timestamp: 1_700_000_000.0 + f64::from(n),
    }
}

/// A ledger with `blocks` mined blocks after genesis, each holding
/// `entries_per_block` entries.
pub fn mined_chain(difficulty: u32, blocks: u32, entries_per_block: u32) -> Blockchain {
    let mut chain =
        Blockchain::new(difficulty).unwrap_or_else(|e| panic!("fixture chain: {}", e));
    for b in 0..blocks {
        for e in 0..entries_per_block {
            chain
                .add(sample_entry(b * entries_per_block + e))
                .unwrap_or_else(|e| panic!("fixture entry: {}", e));
        }
        chain
            .mine_pending()
            .unwrap_or_else(|e| panic!("fixture mining: {}", e));
    }
    chain
}

/// `len` random bytes.
pub fn random_payload(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut data);
    data
}
