//! Golden test vectors for the ledger's hashing.
//!
//! Merkle roots and block hashes are plain SHA-256 over fixed layouts, so any
//! implementation reading the same ledger must reproduce these exactly.

use bmp_ledger::{calculate_merkle_root, Block, BlockData, ZERO_HASH};

/// A Merkle root over a list of byte strings.
#[derive(Debug, Clone)]
pub struct MerkleVector {
    pub name: &'static str,
    pub items: &'static [&'static [u8]],
    /// Expected root (hex).
    pub expected_root: &'static str,
}

/// The hash of a genesis block with fixed fields.
#[derive(Debug, Clone)]
pub struct BlockVector {
    pub name: &'static str,
    pub timestamp: f64,
    pub nonce: u64,
    /// Expected block hash (hex).
    pub expected_hash: &'static str,
}

/// All Merkle vectors.
pub fn merkle_vectors() -> Vec<MerkleVector> {
    vec![
        MerkleVector {
            name: "empty batch",
            items: &[],
            expected_root: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        },
        MerkleVector {
            name: "single item",
            items: &[b"a"],
            expected_root: "ca978112ca1bbdcafac231b39a23dc4da786eff8147c4e72b9807785afee48bb",
        },
        MerkleVector {
            name: "odd level duplicates last",
            items: &[b"a", b"b", b"c"],
            expected_root: "0bdf27bf7ec894ca7cadfe491ec1a3ece840f117989e8c5e9bd7086467bf6c38",
        },
        MerkleVector {
            name: "even level",
            items: &[b"a", b"b", b"c", b"d"],
            expected_root: "58c89d709329eb37285837b042ab6ff72c7c8f74de0446b091b6a0131c102cfd",
        },
        MerkleVector {
            name: "two odd levels",
            items: &[b"a", b"b", b"c", b"d", b"e"],
            expected_root: "3615e586768e706351e326736e446554c49123d0e24c169d3ecf9b791a82636b",
        },
    ]
}

/// All block vectors.
pub fn block_vectors() -> Vec<BlockVector> {
    vec![
        BlockVector {
            name: "unmined genesis",
            timestamp: 1_700_000_000.5,
            nonce: 0,
            expected_hash: "1d09961770ef9018c316788f13e2b7c16fb35e2c732074e71f3927d33b287220",
        },
        BlockVector {
            name: "genesis mined at difficulty 2",
            timestamp: 1_700_000_000.5,
            nonce: 60,
            expected_hash: "001095f497f5fd7dab527da12d153610c34e315c0f35b0131003ce27f29f9f1d",
        },
    ]
}

/// Build the genesis block a vector describes.
pub fn block_from_vector(vector: &BlockVector) -> Block {
    let mut block = Block::new(0, vector.timestamp, BlockData::genesis(), ZERO_HASH)
        .unwrap_or_else(|e| panic!("vector block: {}", e));
    block.nonce = vector.nonce;
    block.hash = block
        .calculate_hash()
        .unwrap_or_else(|e| panic!("vector hash: {}", e));
    block
}

/// Check every vector, reporting `(name, matches, computed)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let merkle = merkle_vectors().into_iter().map(|v| {
        let root = calculate_merkle_root(v.items.iter().copied());
        (v.name.to_string(), root == v.expected_root, root)
    });
    let blocks = block_vectors().into_iter().map(|v| {
        let hash = block_from_vector(&v).hash;
        (v.name.to_string(), hash == v.expected_hash, hash)
    });
    merkle.chain(blocks).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, computed) in verify_all_vectors() {
            assert!(matches, "vector '{}' computed {}", name, computed);
        }
    }

    #[test]
    fn test_mined_vector_meets_difficulty() {
        let vectors = block_vectors();
        let block = block_from_vector(&vectors[1]);
        assert!(block.meets_difficulty(2));

        let mut fresh = Block::new(0, vectors[1].timestamp, BlockData::genesis(), ZERO_HASH).unwrap();
        fresh.mine(2).unwrap();
        assert_eq!(fresh.nonce, vectors[1].nonce);
        assert_eq!(fresh.hash, vectors[1].expected_hash);
    }
}
