//! Inbound message observers.

use async_trait::async_trait;
use bmp_core::{Address, MessageId};
use std::fmt;
use tokio::sync::mpsc;

/// A verified, decrypted inbound text message.
///
/// Only built for messages whose signature checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub id: MessageId,
    pub sender: Address,
    /// Display name claimed in the message metadata.
    pub sender_name: Option<String>,
    pub content: String,
    pub timestamp: f64,
    pub verified: bool,
}

impl fmt::Display for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message from {}", self.sender)?;
        if let Some(name) = &self.sender_name {
            write!(f, " ({})", name)?;
        }
        let preview: String = self.content.chars().take(50).collect();
        write!(f, ": {}", preview)
    }
}

/// Receives every inbound text message after verification.
///
/// An error is logged by the engine and does not stop other observers or the
/// acknowledgment.
#[async_trait]
pub trait MessageObserver: Send + Sync {
    async fn on_message(&self, message: &ReceivedMessage) -> anyhow::Result<()>;
}

/// Observer that forwards messages into a channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ReceivedMessage>,
}

impl ChannelObserver {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReceivedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl MessageObserver for ChannelObserver {
    async fn on_message(&self, message: &ReceivedMessage) -> anyhow::Result<()> {
        self.tx
            .send(message.clone())
            .map_err(|_| anyhow::anyhow!("observer channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReceivedMessage {
        ReceivedMessage {
            id: MessageId::new("m1"),
            sender: Address::new("0123456789abcdef0123"),
            sender_name: Some("Alice".into()),
            content: "hi".into(),
            timestamp: 1.0,
            verified: true,
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(sample().to_string(), "Message from 0123456789abcdef (Alice): hi");
    }

    #[tokio::test]
    async fn test_channel_observer_forwards() {
        let (observer, mut rx) = ChannelObserver::channel();
        observer.on_message(&sample()).await.unwrap();
        assert_eq!(rx.recv().await, Some(sample()));
    }

    #[tokio::test]
    async fn test_channel_observer_closed() {
        let (observer, rx) = ChannelObserver::channel();
        drop(rx);
        assert!(observer.on_message(&sample()).await.is_err());
    }
}
