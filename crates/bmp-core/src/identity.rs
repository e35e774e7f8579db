//! Local identity (wallet) and the peer records others see.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{
    EncryptionKeypair, EncryptionPublicKey, Signature, SigningKeypair, SigningPublicKey,
};
use crate::types::{Address, PeerId};

/// A participant's identity: a display name plus independent signing and
/// key-exchange key pairs. Immutable once created.
#[derive(Clone)]
pub struct Wallet {
    name: String,
    signing: SigningKeypair,
    encryption: EncryptionKeypair,
    address: Address,
}

impl Wallet {
    /// Create a wallet with fresh random keys.
    pub fn generate(name: impl Into<String>) -> Self {
        Self::from_keypairs(
            name,
            SigningKeypair::generate(),
            EncryptionKeypair::generate(),
        )
    }

    /// Create a wallet deterministically from seeds.
    pub fn from_seeds(
        name: impl Into<String>,
        signing_seed: &[u8; 32],
        encryption_seed: [u8; 32],
    ) -> Self {
        Self::from_keypairs(
            name,
            SigningKeypair::from_seed(signing_seed),
            EncryptionKeypair::from_bytes(encryption_seed),
        )
    }

    pub fn from_keypairs(
        name: impl Into<String>,
        signing: SigningKeypair,
        encryption: EncryptionKeypair,
    ) -> Self {
        let address = Address::derive(&signing.public_key());
        Self {
            name: name.into(),
            signing,
            encryption,
            address,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn peer_id(&self) -> PeerId {
        PeerId::from_public_key(&self.signing.public_key())
    }

    pub fn signing_keypair(&self) -> &SigningKeypair {
        &self.signing
    }

    pub fn encryption_keypair(&self) -> &EncryptionKeypair {
        &self.encryption
    }

    pub fn signing_public_key(&self) -> SigningPublicKey {
        self.signing.public_key()
    }

    pub fn encryption_public_key(&self) -> EncryptionPublicKey {
        self.encryption.public_key()
    }

    pub fn sign(&self, bytes: &[u8]) -> Signature {
        self.signing.sign(bytes)
    }

    /// The peer record under which others can reach this wallet.
    pub fn as_peer(&self, host: impl Into<String>, port: u16) -> Peer {
        Peer {
            id: self.peer_id(),
            public_key: Some(self.signing_public_key()),
            encryption_key: Some(self.encryption_public_key()),
            address: host.into(),
            port,
        }
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// A remote participant as known to the peer directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,

    /// Signing key; messages from a peer without one are never accepted.
    pub public_key: Option<SigningPublicKey>,

    /// Key-exchange key; without one, messages to this peer travel in clear.
    pub encryption_key: Option<EncryptionPublicKey>,

    /// Network host.
    pub address: String,

    pub port: u16,
}

impl Peer {
    /// A peer with no known keys.
    pub fn unknown(id: PeerId, address: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            public_key: None,
            encryption_key: None,
            address: address.into(),
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_from_seeds_is_deterministic() {
        let w1 = Wallet::from_seeds("alice", &[1; 32], [2; 32]);
        let w2 = Wallet::from_seeds("alice", &[1; 32], [2; 32]);
        assert_eq!(w1.address(), w2.address());
        assert_eq!(w1.encryption_public_key(), w2.encryption_public_key());
        assert_eq!(w1.name(), "alice");
    }

    #[test]
    fn test_key_families_are_independent() {
        let w = Wallet::from_seeds("alice", &[1; 32], [1; 32]);
        assert_ne!(
            w.signing_public_key().as_bytes(),
            w.encryption_public_key().as_bytes()
        );
    }

    #[test]
    fn test_wallet_signature_verifies() {
        let w = Wallet::generate("bob");
        let sig = w.sign(b"payload");
        assert!(w.signing_public_key().verify(b"payload", sig.as_ref()));
    }

    #[test]
    fn test_as_peer_advertises_both_keys() {
        let w = Wallet::generate("carol");
        let peer = w.as_peer("127.0.0.1", 9000);
        assert_eq!(peer.id, w.peer_id());
        assert_eq!(peer.public_key, Some(w.signing_public_key()));
        assert_eq!(peer.encryption_key, Some(w.encryption_public_key()));
        assert_eq!(peer.port, 9000);
    }

    #[test]
    fn test_debug_hides_keys() {
        let w = Wallet::from_seeds("dave", &[9; 32], [9; 32]);
        let debug = format!("{:?}", w);
        assert!(debug.contains("dave"));
        assert!(!debug.contains(&w.signing_public_key().to_hex()));
    }
}
