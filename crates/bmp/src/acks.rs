//! Pending-acknowledgment table.
//!
//! Every direct text message is tracked under its id until the matching
//! acknowledgment arrives. Entries past their deadline are handed back for
//! resending until the retry budget runs out.

use bmp_core::{Message, MessageId, PeerId};
use std::collections::HashMap;
use std::time::Instant;

use crate::config::AckConfig;

#[derive(Debug)]
struct PendingAck {
    message: Message,
    recipient: PeerId,
    deadline: Instant,
    retries: u32,
}

/// Messages due for another delivery attempt, and those given up on.
#[derive(Debug, Default)]
pub struct DueAcks {
    pub resend: Vec<(Message, PeerId)>,
    pub abandoned: Vec<MessageId>,
}

/// Outstanding direct messages keyed by id.
#[derive(Debug)]
pub struct PendingAcks {
    entries: HashMap<MessageId, PendingAck>,
    config: AckConfig,
}

impl PendingAcks {
    pub fn new(config: AckConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
        }
    }

    /// Start waiting for an acknowledgment of `message`.
    pub fn track(&mut self, message: Message, recipient: PeerId, now: Instant) {
        self.entries.insert(
            message.id.clone(),
            PendingAck {
                message,
                recipient,
                deadline: now + self.config.timeout,
                retries: 0,
            },
        );
    }

    /// Stop tracking a message. Returns whether it was pending.
    pub fn resolve(&mut self, id: &MessageId) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Resolve `id` on an acknowledgment from `from`.
    ///
    /// Only the peer the message was sent to can acknowledge it; an
    /// acknowledgment from anyone else leaves the entry pending.
    pub fn acknowledge(&mut self, id: &MessageId, from: &PeerId) -> bool {
        match self.entries.get(id) {
            Some(entry) if &entry.recipient == from => self.entries.remove(id).is_some(),
            _ => false,
        }
    }

    pub fn is_pending(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect entries whose deadline has passed at `now`.
    ///
    /// Each returned resend pushes that entry's deadline out by one timeout;
    /// entries that already used `max_retries` resends are removed instead.
    pub fn take_due(&mut self, now: Instant) -> DueAcks {
        let mut due = DueAcks::default();
        let timeout = self.config.timeout;
        let max_retries = self.config.max_retries;

        self.entries.retain(|id, entry| {
            if entry.deadline > now {
                return true;
            }
            if entry.retries >= max_retries {
                due.abandoned.push(id.clone());
                return false;
            }
            entry.retries += 1;
            entry.deadline = now + timeout;
            due.resend.push((entry.message.clone(), entry.recipient.clone()));
            true
        });
        due
    }
}
