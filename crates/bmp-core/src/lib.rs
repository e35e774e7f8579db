//! # BMP Core
//!
//! Primitives shared by every BMP component: identities, the crypto envelope
//! and the signed [`Message`].
//!
//! This crate contains no I/O and no networking.
//!
//! ## Key Types
//!
//! - [`Wallet`] - A participant's signing and key-exchange identity
//! - [`Peer`] - A remote participant as advertised by the directory
//! - [`Message`] - The signed unit exchanged between peers
//! - [`SharedSecret`] - Symmetric secret derived by X25519 key agreement
//!
//! ## Canonicalization
//!
//! Messages are signed over deterministic CBOR. See the [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod message;
pub mod types;

pub use canonical::encode_canonical;
pub use crypto::{
    decrypt, derive_shared_secret, encrypt, generate_encryption_keypair,
    generate_signing_keypair, sign, verify, EncryptionKeypair, EncryptionPublicKey, Nonce,
    SharedSecret, Signature, SigningKeypair, SigningPublicKey,
};
pub use error::{CoreError, Result};
pub use identity::{Peer, Wallet};
pub use message::{ChunkInfo, Message, MessageType, METADATA_NAME};
pub use types::{
    unix_timestamp, Address, MessageId, PeerId, Recipient, StreamId, BROADCAST_RECIPIENT,
};
