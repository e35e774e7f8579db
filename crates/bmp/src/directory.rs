//! Peer directory abstraction.
//!
//! The directory is the engine's only view of the network: it resolves peer
//! ids to [`Peer`] records, delivers messages and yields inbound messages
//! together with the peer they came from. Real implementations wrap sockets;
//! [`memory`] routes between engines in one process.

use async_trait::async_trait;
use bmp_core::{Message, Peer, PeerId};

use crate::error::DirectoryError;

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// A message received from the network.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub message: Message,
    /// The sending peer as known locally. A peer the directory has no record
    /// of is reported without keys.
    pub origin: Peer,
}

/// Directory of reachable peers.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    /// Look up a peer.
    async fn get_peer(&self, id: &PeerId) -> Option<Peer>;

    /// Deliver a message to one peer.
    async fn send_message(&self, message: Message, recipient: &PeerId) -> Result<()>;

    /// Deliver a message to every known peer. Returns how many were reached.
    async fn broadcast(&self, message: Message) -> Result<usize>;

    /// Wait for the next inbound message. `None` once the directory is closed.
    ///
    /// Must be cancel-safe: dropping the future before it completes must not
    /// lose a message.
    async fn recv(&self) -> Result<Option<Inbound>>;
}

/// In-memory directory for tests and simulations.
///
/// Messages cross the network in their wire encoding, so every delivery
/// exercises serialization the way a socket transport would.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
    use tokio::sync::{mpsc, Mutex, RwLock};
    use tracing::{debug, warn};

    /// Wire bytes plus routing.
    #[derive(Debug)]
    struct Envelope {
        from: PeerId,
        bytes: Vec<u8>,
    }

    /// Shared routing table for the memory network.
    pub struct MemoryNetwork {
        endpoints: RwLock<HashMap<PeerId, mpsc::Sender<Envelope>>>,
    }

    impl MemoryNetwork {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Attach a node and return its directory.
        pub async fn join(self: &Arc<Self>, local: PeerId) -> MemoryDirectory {
            let (tx, rx) = mpsc::channel(1000);
            self.endpoints.write().await.insert(local.clone(), tx);

            MemoryDirectory {
                local,
                network: Arc::clone(self),
                known: StdRwLock::new(HashMap::new()),
                receiver: Mutex::new(rx),
            }
        }

        /// Detach a node; later deliveries to it fail.
        pub async fn leave(&self, id: &PeerId) {
            self.endpoints.write().await.remove(id);
        }

        async fn deliver(&self, from: &PeerId, to: &PeerId, message: &Message) -> Result<()> {
            let bytes = message
                .to_bytes()
                .map_err(|e| DirectoryError::Transport(e.to_string()))?;
            let sender = self
                .endpoints
                .read()
                .await
                .get(to)
                .cloned()
                .ok_or_else(|| DirectoryError::UnknownPeer(to.clone()))?;
            sender
                .send(Envelope {
                    from: from.clone(),
                    bytes,
                })
                .await
                .map_err(|_| DirectoryError::Disconnected(to.clone()))
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                endpoints: RwLock::new(HashMap::new()),
            }
        }
    }

    /// One node's view of the memory network.
    pub struct MemoryDirectory {
        local: PeerId,
        network: Arc<MemoryNetwork>,
        /// Peers this node has registered, keyed by id.
        known: StdRwLock<HashMap<PeerId, Peer>>,
        receiver: Mutex<mpsc::Receiver<Envelope>>,
    }

    impl MemoryDirectory {
        pub fn local_id(&self) -> &PeerId {
            &self.local
        }

        /// Register or update a peer record.
        pub fn add_peer(&self, peer: Peer) {
            self.known
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(peer.id.clone(), peer);
        }

        pub fn remove_peer(&self, id: &PeerId) -> Option<Peer> {
            self.known
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(id)
        }

        pub fn peers(&self) -> Vec<Peer> {
            self.known
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .cloned()
                .collect()
        }

        fn lookup(&self, id: &PeerId) -> Option<Peer> {
            self.known
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(id)
                .cloned()
        }
    }

    #[async_trait]
    impl PeerDirectory for MemoryDirectory {
        async fn get_peer(&self, id: &PeerId) -> Option<Peer> {
            self.lookup(id)
        }

        async fn send_message(&self, message: Message, recipient: &PeerId) -> Result<()> {
            self.network.deliver(&self.local, recipient, &message).await
        }

        async fn broadcast(&self, message: Message) -> Result<usize> {
            let targets: Vec<PeerId> = self
                .peers()
                .into_iter()
                .map(|p| p.id)
                .filter(|id| id != &self.local)
                .collect();

            let mut reached = 0;
            for target in targets {
                // Some peers may have left; the rest still get the message.
                match self.network.deliver(&self.local, &target, &message).await {
                    Ok(()) => reached += 1,
                    Err(e) => debug!(peer = %target, error = %e, "broadcast delivery failed"),
                }
            }
            Ok(reached)
        }

        async fn recv(&self) -> Result<Option<Inbound>> {
            let mut rx = self.receiver.lock().await;
            loop {
                let Some(envelope) = rx.recv().await else {
                    return Ok(None);
                };
                match Message::from_bytes(&envelope.bytes) {
                    Ok(message) => {
                        let origin = self
                            .lookup(&envelope.from)
                            .unwrap_or_else(|| Peer::unknown(envelope.from, "", 0));
                        return Ok(Some(Inbound { message, origin }));
                    }
                    Err(e) => {
                        warn!(peer = %envelope.from, error = %e, "dropping undecodable message");
                    }
                }
            }
        }
    }
}
