//! Typed ledger payloads.
//!
//! Entries record message activity, never message content.

use bmp_core::{Address, MessageId, Recipient};
use serde::{Deserialize, Serialize};

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEntry {
    /// An outbound direct message.
    Message {
        id: MessageId,
        sender: Address,
        recipient: Recipient,
        timestamp: f64,
    },

    /// A verified inbound text message.
    Received {
        id: MessageId,
        sender: Address,
        timestamp: f64,
    },

    /// An outbound broadcast.
    Broadcast {
        id: MessageId,
        sender: Address,
        timestamp: f64,
    },

    /// A ledger-internal note, e.g. the genesis marker.
    System { message: String },
}

impl LedgerEntry {
    /// The tag stored in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEntry::Message { .. } => "message",
            LedgerEntry::Received { .. } => "received",
            LedgerEntry::Broadcast { .. } => "broadcast",
            LedgerEntry::System { .. } => "system",
        }
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            LedgerEntry::Message { id, .. }
            | LedgerEntry::Received { id, .. }
            | LedgerEntry::Broadcast { id, .. } => Some(id),
            LedgerEntry::System { .. } => None,
        }
    }

    pub fn sender(&self) -> Option<&Address> {
        match self {
            LedgerEntry::Message { sender, .. }
            | LedgerEntry::Received { sender, .. }
            | LedgerEntry::Broadcast { sender, .. } => Some(sender),
            LedgerEntry::System { .. } => None,
        }
    }

    pub fn timestamp(&self) -> Option<f64> {
        match self {
            LedgerEntry::Message { timestamp, .. }
            | LedgerEntry::Received { timestamp, .. }
            | LedgerEntry::Broadcast { timestamp, .. } => Some(*timestamp),
            LedgerEntry::System { .. } => None,
        }
    }
}

/// The payload of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    /// A mined batch of pending entries.
    Batch { messages: Vec<LedgerEntry> },

    /// A single entry, used by the genesis block.
    Entry(LedgerEntry),
}

impl BlockData {
    pub fn genesis() -> Self {
        BlockData::Entry(LedgerEntry::System {
            message: "Genesis Block".to_string(),
        })
    }

    /// Entries carried by a batch; a single-entry payload yields none.
    pub fn entries(&self) -> &[LedgerEntry] {
        match self {
            BlockData::Batch { messages } => messages,
            BlockData::Entry(_) => &[],
        }
    }
}
