//! Strong identifier types for BMP.
//!
//! Identifiers travel as strings (hex) on the wire and in the ledger, but are
//! newtypes here so a peer id can never be passed where an address is expected.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::SigningPublicKey;

/// Wildcard recipient used for broadcasts.
pub const BROADCAST_RECIPIENT: &str = "*";

/// Number of characters shown when an identifier is displayed in logs.
const DISPLAY_PREFIX: usize = 16;

fn short(s: &str) -> &str {
    s.get(..DISPLAY_PREFIX).unwrap_or(s)
}

/// A unique message identifier (32 hex characters, 128 random bits).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", short(&self.0))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short(&self.0))
    }
}

/// An address derived from a signing public key (see [`crate::Wallet`]).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Derive the address for a signing public key.
    ///
    /// `hex(blake3_derive_key("bmp-v0 address", public_key))[..40]`
    pub fn derive(public_key: &SigningPublicKey) -> Self {
        let hash = blake3::derive_key("bmp-v0 address", public_key.as_bytes());
        Self(hex::encode(&hash[..20]))
    }

    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", short(&self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short(&self.0))
    }
}

/// A peer identifier: the hex encoding of the peer's signing public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    pub fn from_public_key(public_key: &SigningPublicKey) -> Self {
        Self(public_key.to_hex())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", short(&self.0))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short(&self.0))
    }
}

/// Identifier shared by every chunk of one stream (32 hex characters).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Generate a fresh random stream id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Content-derived stream id: the same payload always yields the same id.
    pub fn for_payload(data: &[u8]) -> Self {
        let hash = blake3::derive_key("bmp-v0 stream", data);
        Self(hex::encode(&hash[..16]))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", short(&self.0))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short(&self.0))
    }
}

/// Current wall-clock time as fractional Unix seconds.
///
/// Clocks set before 1970 read as `0.0`.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// The recipient field of a message: a single party or every connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Recipient {
    /// A peer id or address.
    Direct(String),
    /// The broadcast wildcard.
    Broadcast,
}

impl Recipient {
    pub fn as_str(&self) -> &str {
        match self {
            Recipient::Direct(id) => id,
            Recipient::Broadcast => BROADCAST_RECIPIENT,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Recipient::Broadcast)
    }
}

impl From<String> for Recipient {
    fn from(s: String) -> Self {
        if s == BROADCAST_RECIPIENT {
            Recipient::Broadcast
        } else {
            Recipient::Direct(s)
        }
    }
}

impl From<Recipient> for String {
    fn from(r: Recipient) -> Self {
        match r {
            Recipient::Direct(id) => id,
            Recipient::Broadcast => BROADCAST_RECIPIENT.to_string(),
        }
    }
}

impl From<&PeerId> for Recipient {
    fn from(id: &PeerId) -> Self {
        Recipient::Direct(id.as_str().to_string())
    }
}

impl From<&Address> for Recipient {
    fn from(address: &Address) -> Self {
        Recipient::Direct(address.as_str().to_string())
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(short(self.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SigningKeypair;

    #[test]
    fn test_message_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn test_address_derivation_is_stable() {
        let keypair = SigningKeypair::from_seed(&[0x42; 32]);
        let a1 = Address::derive(&keypair.public_key());
        let a2 = Address::derive(&keypair.public_key());
        assert_eq!(a1, a2);
        assert_eq!(a1.as_str().len(), 40);

        let other = SigningKeypair::from_seed(&[0x43; 32]);
        assert_ne!(a1, Address::derive(&other.public_key()));
    }

    #[test]
    fn test_peer_id_display_is_prefix() {
        let keypair = SigningKeypair::from_seed(&[0xab; 32]);
        let id = PeerId::from_public_key(&keypair.public_key());
        assert_eq!(format!("{}", id).len(), 16);
        assert!(id.as_str().starts_with(&format!("{}", id)));
    }

    #[test]
    fn test_short_ids_display_whole() {
        assert_eq!(format!("{}", PeerId::new("bob")), "bob");
    }

    #[test]
    fn test_stream_id_for_payload_is_deterministic() {
        assert_eq!(StreamId::for_payload(b"abc"), StreamId::for_payload(b"abc"));
        assert_ne!(StreamId::for_payload(b"abc"), StreamId::for_payload(b"abd"));
        assert_ne!(StreamId::generate(), StreamId::generate());
    }

    #[test]
    fn test_unix_timestamp_is_recent() {
        // 2020-01-01
        assert!(unix_timestamp() > 1_577_836_800.0);
    }

    #[test]
    fn test_recipient_wildcard() {
        assert_eq!(Recipient::from("*".to_string()), Recipient::Broadcast);
        assert!(Recipient::Broadcast.is_broadcast());
        assert_eq!(String::from(Recipient::Broadcast), "*");
        let direct = Recipient::from("abc".to_string());
        assert_eq!(direct.as_str(), "abc");
        assert!(!direct.is_broadcast());
    }
}
