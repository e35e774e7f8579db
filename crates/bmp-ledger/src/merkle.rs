//! Merkle root over a batch of items.
//!
//! Leaves are SHA-256 hex digests. Each level concatenates adjacent hex
//! strings and hashes them; an odd level duplicates its last hash. The root
//! of an empty batch is the hash of the empty string.

use sha2::{Digest, Sha256};

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute the Merkle root of `items`.
pub fn calculate_merkle_root<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut level: Vec<String> = items
        .into_iter()
        .map(|item| sha256_hex(item.as_ref()))
        .collect();

    if level.is_empty() {
        return sha256_hex(b"");
    }

    while level.len() > 1 {
        level = compute_next_level(level);
    }
    level.swap_remove(0)
}

fn compute_next_level(mut level: Vec<String>) -> Vec<String> {
    if level.len() % 2 != 0 {
        if let Some(last) = level.last().cloned() {
            level.push(last);
        }
    }

    level
        .chunks(2)
        .map(|pair| {
            let mut hasher = Sha256::new();
            hasher.update(pair[0].as_bytes());
            hasher.update(pair[1].as_bytes());
            hex::encode(hasher.finalize())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_empty_is_hash_of_empty() {
        assert_eq!(calculate_merkle_root(Vec::<Vec<u8>>::new()), EMPTY);
    }

    #[test]
    fn test_single_item_is_its_hash() {
        assert_eq!(calculate_merkle_root([b"a"]), sha256_hex(b"a"));
    }

    #[test]
    fn test_two_items() {
        let expected = sha256_hex(format!("{}{}", sha256_hex(b"a"), sha256_hex(b"b")).as_bytes());
        assert_eq!(calculate_merkle_root([b"a", b"b"]), expected);
    }

    #[test]
    fn test_odd_count_duplicates_last() {
        assert_eq!(
            calculate_merkle_root([b"a", b"b", b"c"]),
            calculate_merkle_root([b"a", b"b", b"c", b"c"])
        );
        assert_eq!(
            calculate_merkle_root([b"a", b"b", b"c"]),
            "0bdf27bf7ec894ca7cadfe491ec1a3ece840f117989e8c5e9bd7086467bf6c38"
        );
    }

    #[test]
    fn test_four_items() {
        assert_eq!(
            calculate_merkle_root([b"a", b"b", b"c", b"d"]),
            "58c89d709329eb37285837b042ab6ff72c7c8f74de0446b091b6a0131c102cfd"
        );
    }

    #[test]
    fn test_order_matters() {
        assert_ne!(
            calculate_merkle_root([b"a", b"b"]),
            calculate_merkle_root([b"b", b"a"])
        );
    }
}
