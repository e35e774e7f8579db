//! Message: the signed unit exchanged between peers.
//!
//! A message is signed over its canonical signable content (every field
//! except the signature). Content may be ciphertext, in which case `nonce`
//! carries the AEAD nonce.

use bytes::Bytes;
use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::encode_canonical;
use crate::crypto::{Nonce, SigningKeypair, SigningPublicKey};
use crate::error::{CoreError, Result};
use crate::types::{unix_timestamp, Address, MessageId, Recipient, StreamId};

/// Metadata key carrying the sender's display name.
pub const METADATA_NAME: &str = "name";

/// Field keys of the signable map. Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const ID: u64 = 0;
    pub const TYPE: u64 = 1;
    pub const SENDER: u64 = 2;
    pub const RECIPIENT: u64 = 3;
    pub const TIMESTAMP: u64 = 4;
    pub const CONTENT: u64 = 5;
    pub const NONCE: u64 = 6;
    pub const METADATA: u64 = 7;
    pub const CHUNK_INFO: u64 = 8;

    pub const CHUNK_STREAM_ID: u64 = 0;
    pub const CHUNK_SEQUENCE: u64 = 1;
    pub const CHUNK_TOTAL: u64 = 2;
}

/// The type of a message, driving inbound dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MessageType {
    Text = 0,
    Ack = 1,
    StreamStart = 2,
    StreamChunk = 3,
    StreamEnd = 4,
}

impl MessageType {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Text),
            1 => Some(Self::Ack),
            2 => Some(Self::StreamStart),
            3 => Some(Self::StreamChunk),
            4 => Some(Self::StreamEnd),
            _ => None,
        }
    }

    /// Whether this type carries a stream chunk.
    pub fn is_stream(self) -> bool {
        matches!(self, Self::StreamStart | Self::StreamChunk | Self::StreamEnd)
    }

    /// The stream message type for chunk `sequence` of `total`.
    ///
    /// The last chunk is always `StreamEnd`, so a one-chunk stream is a single
    /// `StreamEnd`.
    pub fn for_stream_position(sequence: u32, total: u32) -> Self {
        if sequence.saturating_add(1) >= total {
            Self::StreamEnd
        } else if sequence == 0 {
            Self::StreamStart
        } else {
            Self::StreamChunk
        }
    }
}

/// Position of a stream chunk carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub stream_id: StreamId,
    pub sequence: u32,
    pub total: u32,
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    #[serde(rename = "type")]
    pub msg_type: MessageType,

    /// Sender address.
    pub sender: Address,

    pub recipient: Recipient,

    /// Sender-claimed Unix seconds. Untrusted.
    pub timestamp: f64,

    /// Plaintext or ciphertext, depending on `nonce`.
    pub content: Bytes,

    /// AEAD nonce; present iff `content` is encrypted.
    pub nonce: Option<Bytes>,

    /// Ed25519 signature over [`Message::signable_content`].
    pub signature: Bytes,

    pub metadata: BTreeMap<String, String>,

    pub chunk_info: Option<ChunkInfo>,
}

impl Message {
    /// Create an unsigned message with a fresh id and the current time.
    pub fn new(
        msg_type: MessageType,
        sender: Address,
        recipient: Recipient,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            msg_type,
            sender,
            recipient,
            timestamp: unix_timestamp(),
            content: content.into(),
            nonce: None,
            signature: Bytes::new(),
            metadata: BTreeMap::new(),
            chunk_info: None,
        }
    }

    pub fn text(sender: Address, recipient: Recipient, content: impl Into<Bytes>) -> Self {
        Self::new(MessageType::Text, sender, recipient, content)
    }

    /// An acknowledgment whose content is the acknowledged message id.
    pub fn ack(sender: Address, recipient: Recipient, original: &MessageId) -> Self {
        Self::new(
            MessageType::Ack,
            sender,
            recipient,
            Bytes::copy_from_slice(original.as_str().as_bytes()),
        )
    }

    /// One chunk of a stream; the type follows the chunk's position.
    pub fn stream_part(
        sender: Address,
        recipient: Recipient,
        info: ChunkInfo,
        data: impl Into<Bytes>,
    ) -> Self {
        let msg_type = MessageType::for_stream_position(info.sequence, info.total);
        let mut message = Self::new(msg_type, sender, recipient, data);
        message.chunk_info = Some(info);
        message
    }

    /// Replace the content with ciphertext and record its nonce.
    pub fn with_ciphertext(mut self, nonce: Nonce, ciphertext: Vec<u8>) -> Self {
        self.content = Bytes::from(ciphertext);
        self.nonce = Some(Bytes::copy_from_slice(nonce.as_bytes()));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_encrypted(&self) -> bool {
        self.nonce.is_some()
    }

    /// Sender display name from metadata, if any.
    pub fn sender_name(&self) -> Option<&str> {
        self.metadata.get(METADATA_NAME).map(String::as_str)
    }

    /// The message id an `Ack` refers to.
    pub fn acked_message_id(&self) -> Option<MessageId> {
        if self.msg_type != MessageType::Ack {
            return None;
        }
        std::str::from_utf8(&self.content)
            .ok()
            .map(MessageId::new)
    }

    /// Canonical CBOR of every field except `signature`.
    pub fn signable_content(&self) -> Result<Vec<u8>> {
        let k = |key: u64| Value::Integer(key.into());

        let nonce = match &self.nonce {
            Some(n) => Value::Bytes(n.to_vec()),
            None => Value::Null,
        };
        let metadata = Value::Map(
            self.metadata
                .iter()
                .map(|(key, value)| (Value::Text(key.clone()), Value::Text(value.clone())))
                .collect(),
        );
        let chunk_info = match &self.chunk_info {
            Some(info) => Value::Map(vec![
                (
                    k(keys::CHUNK_STREAM_ID),
                    Value::Text(info.stream_id.as_str().to_string()),
                ),
                (k(keys::CHUNK_SEQUENCE), Value::Integer(info.sequence.into())),
                (k(keys::CHUNK_TOTAL), Value::Integer(info.total.into())),
            ]),
            None => Value::Null,
        };

        let value = Value::Map(vec![
            (k(keys::ID), Value::Text(self.id.as_str().to_string())),
            (k(keys::TYPE), Value::Integer(self.msg_type.to_u8().into())),
            (k(keys::SENDER), Value::Text(self.sender.as_str().to_string())),
            (k(keys::RECIPIENT), Value::Text(self.recipient.as_str().to_string())),
            (k(keys::TIMESTAMP), Value::Float(self.timestamp)),
            (k(keys::CONTENT), Value::Bytes(self.content.to_vec())),
            (k(keys::NONCE), nonce),
            (k(keys::METADATA), metadata),
            (k(keys::CHUNK_INFO), chunk_info),
        ]);
        encode_canonical(&value)
    }

    /// Sign the message in place.
    pub fn sign(&mut self, keypair: &SigningKeypair) -> Result<()> {
        let signable = self.signable_content()?;
        self.signature = Bytes::from(keypair.sign(&signable).to_vec());
        Ok(())
    }

    /// Check the signature against `public_key`. Fails closed.
    pub fn verify(&self, public_key: &SigningPublicKey) -> bool {
        match self.signable_content() {
            Ok(signable) => public_key.verify(&signable, &self.signature),
            Err(_) => false,
        }
    }

    /// Serialize for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Parse from wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}
