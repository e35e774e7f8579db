//! The transmission engine: unified API for sending and receiving messages.
//!
//! The engine signs, encrypts and dispatches outbound messages through a
//! [`PeerDirectory`], and verifies, decrypts and dispatches inbound ones to
//! registered observers. Message activity is recorded on the ledger.
//!
//! Shared state sits behind `std::sync::Mutex` guards that are released
//! before every `.await`, so operations interleave only at network calls.

use std::collections::{HashMap, HashSet, VecDeque};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bmp_chunk::{Chunk, ChunkReassembler, DataChunker};
use bmp_core::{
    decrypt, derive_shared_secret, encrypt, Address, ChunkInfo, EncryptionPublicKey, Message,
    MessageId, MessageType, Nonce, Peer, PeerId, Recipient, SharedSecret, StreamId, Wallet,
    METADATA_NAME,
};
use bmp_ledger::{Block, Blockchain, CancelFlag, LedgerEntry};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::acks::PendingAcks;
use crate::config::EngineConfig;
use crate::directory::{Inbound, PeerDirectory};
use crate::error::{EngineError, Result};
use crate::observer::{MessageObserver, ReceivedMessage};

/// A reassembled inbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedStream {
    pub stream_id: StreamId,
    pub sender: Address,
    pub data: Vec<u8>,
}

/// Outcome of [`TransmissionEngine::retry_unacknowledged`].
#[derive(Debug, Default)]
pub struct RetryReport {
    /// Messages handed to the directory again.
    pub resent: usize,
    /// Messages that used up their retries without an acknowledgment.
    pub abandoned: Vec<MessageId>,
}

/// A shared secret and the peer key it was derived from.
struct CachedSecret {
    peer_key: EncryptionPublicKey,
    secret: SharedSecret,
}

/// Bounded memory of inbound text message ids.
struct RecentIds {
    order: VecDeque<MessageId>,
    seen: HashSet<MessageId>,
    capacity: usize,
}

impl RecentIds {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            seen: HashSet::new(),
            capacity,
        }
    }

    /// Record `id`; returns false if it was already present.
    fn insert(&mut self, id: &MessageId) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if !self.seen.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id.clone());
        if self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

struct EngineState {
    secrets: HashMap<PeerId, CachedSecret>,
    reassembler: ChunkReassembler,
    acks: PendingAcks,
    completed: Vec<CompletedStream>,
    recent: RecentIds,
}

/// The main engine.
///
/// Owns the shared-secret cache, the stream reassembler and the
/// pending-acknowledgment table. The ledger may be shared with other holders.
pub struct TransmissionEngine<D: PeerDirectory> {
    wallet: Wallet,
    directory: Arc<D>,
    ledger: Arc<Mutex<Blockchain>>,
    chunker: DataChunker,
    config: EngineConfig,
    state: Mutex<EngineState>,
    observers: Mutex<Vec<Arc<dyn MessageObserver>>>,
}

impl<D: PeerDirectory> TransmissionEngine<D> {
    /// Create an engine with its own ledger (mines the genesis block).
    pub fn new(wallet: Wallet, directory: Arc<D>, config: EngineConfig) -> Result<Self> {
        let ledger = Blockchain::new(config.ledger_difficulty)?;
        Self::with_ledger(wallet, directory, Arc::new(Mutex::new(ledger)), config)
    }

    /// Create an engine recording onto an existing ledger.
    pub fn with_ledger(
        wallet: Wallet,
        directory: Arc<D>,
        ledger: Arc<Mutex<Blockchain>>,
        config: EngineConfig,
    ) -> Result<Self> {
        let chunker = DataChunker::new(config.chunk_size)?;
        let state = EngineState {
            secrets: HashMap::new(),
            reassembler: ChunkReassembler::new(config.reassembly.clone()),
            acks: PendingAcks::new(config.ack.clone()),
            completed: Vec::new(),
            recent: RecentIds::new(config.dedup_window),
        };

        Ok(Self {
            wallet,
            directory,
            ledger,
            chunker,
            config,
            state: Mutex::new(state),
            observers: Mutex::new(Vec::new()),
        })
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    pub fn ledger(&self) -> &Arc<Mutex<Blockchain>> {
        &self.ledger
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an observer for inbound text messages.
    pub fn on_message(&self, observer: Arc<dyn MessageObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Blockchain> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, entry: LedgerEntry) {
        if let Err(e) = self.lock_ledger().add(entry) {
            error!(error = %e, "failed to record ledger entry");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared Secrets
    // ─────────────────────────────────────────────────────────────────────────

    /// Shared secret with `peer`, derived once and cached per peer id.
    ///
    /// `None` when the peer has no known encryption key or advertises a
    /// low-order one. If the peer starts advertising a different key, the
    /// secret is derived again.
    pub fn get_shared_secret(&self, peer: &Peer) -> Option<SharedSecret> {
        let peer_key = peer.encryption_key?;
        let mut state = self.state();

        if let Some(cached) = state.secrets.get(&peer.id) {
            if cached.peer_key == peer_key {
                return Some(cached.secret.clone());
            }
            debug!(peer = %peer.id, "peer encryption key changed, re-deriving secret");
        }

        let secret = match derive_shared_secret(self.wallet.encryption_keypair(), &peer_key) {
            Ok(secret) => secret,
            Err(e) => {
                warn!(peer = %peer.id, error = %e, "cannot derive shared secret");
                state.secrets.remove(&peer.id);
                return None;
            }
        };
        state.secrets.insert(
            peer.id.clone(),
            CachedSecret {
                peer_key,
                secret: secret.clone(),
            },
        );
        Some(secret)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────

    fn outbound(&self, msg_type: MessageType, recipient: Recipient, content: Vec<u8>) -> Message {
        Message::new(msg_type, self.wallet.address().clone(), recipient, content)
            .with_metadata(METADATA_NAME, self.wallet.name())
    }

    /// Send a text message to a known peer.
    ///
    /// The content is encrypted when `encrypt` is set and the peer's
    /// encryption key is known; it is always signed. The ledger entry is
    /// recorded whether or not delivery succeeds. Returns false when the
    /// recipient is unknown or delivery fails.
    pub async fn send_text(&self, recipient: &PeerId, text: &str, encrypt_content: bool) -> bool {
        let Some(peer) = self.directory.get_peer(recipient).await else {
            warn!(peer = %recipient, "peer not found");
            return false;
        };

        let mut message = self.outbound(
            MessageType::Text,
            Recipient::from(recipient),
            text.as_bytes().to_vec(),
        );
        if encrypt_content && peer.encryption_key.is_some() {
            // A key that cannot yield a secret never downgrades to plaintext.
            let Some(secret) = self.get_shared_secret(&peer) else {
                return false;
            };
            match encrypt(text.as_bytes(), &secret) {
                Ok((nonce, ciphertext)) => message = message.with_ciphertext(nonce, ciphertext),
                Err(e) => {
                    error!(peer = %recipient, error = %e, "failed to encrypt message");
                    return false;
                }
            }
        }
        if let Err(e) = message.sign(self.wallet.signing_keypair()) {
            error!(error = %e, "failed to sign message");
            return false;
        }

        let id = message.id.clone();
        let encrypted = message.is_encrypted();
        self.record(LedgerEntry::Message {
            id: id.clone(),
            sender: message.sender.clone(),
            recipient: message.recipient.clone(),
            timestamp: message.timestamp,
        });
        // Tracked before dispatch so a fast acknowledgment always finds it.
        self.state()
            .acks
            .track(message.clone(), recipient.clone(), Instant::now());

        match self.directory.send_message(message, recipient).await {
            Ok(()) => {
                info!(peer = %recipient, message_id = %id, encrypted, "sent message");
                true
            }
            Err(e) => {
                self.state().acks.resolve(&id);
                warn!(peer = %recipient, message_id = %id, error = %e, "delivery failed");
                false
            }
        }
    }

    /// [`TransmissionEngine::send_text`] with the configured encryption default.
    pub async fn send(&self, recipient: &PeerId, text: &str) -> bool {
        self.send_text(recipient, text, self.config.encrypt_by_default)
            .await
    }

    /// Send a signed, unencrypted text message to every known peer.
    ///
    /// Returns the number of peers reached.
    pub async fn broadcast_text(&self, text: &str) -> usize {
        let mut message = self.outbound(
            MessageType::Text,
            Recipient::Broadcast,
            text.as_bytes().to_vec(),
        );
        if let Err(e) = message.sign(self.wallet.signing_keypair()) {
            error!(error = %e, "failed to sign broadcast");
            return 0;
        }

        self.record(LedgerEntry::Broadcast {
            id: message.id.clone(),
            sender: message.sender.clone(),
            timestamp: message.timestamp,
        });

        match self.directory.broadcast(message).await {
            Ok(count) => {
                info!(peers = count, "broadcast sent");
                count
            }
            Err(e) => {
                warn!(error = %e, "broadcast failed");
                0
            }
        }
    }

    /// Send `data` to a peer as a chunked stream.
    ///
    /// The first chunk travels as `StreamStart`, the last as `StreamEnd` and
    /// the rest as `StreamChunk`. Chunks are signed but not encrypted.
    pub async fn send_stream(&self, recipient: &PeerId, data: &[u8]) -> Result<StreamId> {
        if self.directory.get_peer(recipient).await.is_none() {
            return Err(EngineError::UnknownPeer(recipient.clone()));
        }
        if data.is_empty() {
            return Err(EngineError::EmptyStream);
        }

        let stream_id = StreamId::generate();
        let chunks = self.chunker.chunk_stream(stream_id.clone(), data)?;
        let total = chunks.total();

        for chunk in chunks {
            let info = ChunkInfo {
                stream_id: stream_id.clone(),
                sequence: chunk.sequence,
                total: chunk.total,
            };
            let mut message = Message::stream_part(
                self.wallet.address().clone(),
                Recipient::from(recipient),
                info,
                chunk.data,
            )
            .with_metadata(METADATA_NAME, self.wallet.name());
            message.sign(self.wallet.signing_keypair())?;
            self.directory.send_message(message, recipient).await?;
        }

        info!(peer = %recipient, stream = %stream_id, chunks = total, bytes = data.len(), "sent stream");
        Ok(stream_id)
    }

    /// Resend direct messages whose acknowledgment is overdue.
    pub async fn retry_unacknowledged(&self) -> RetryReport {
        let due = self.state().acks.take_due(Instant::now());
        let mut report = RetryReport {
            resent: 0,
            abandoned: due.abandoned,
        };

        for id in &report.abandoned {
            warn!(message_id = %id, "no acknowledgment after retries, giving up");
        }
        for (message, recipient) in due.resend {
            let id = message.id.clone();
            match self.directory.send_message(message, &recipient).await {
                Ok(()) => {
                    debug!(peer = %recipient, message_id = %id, "resent unacknowledged message");
                    report.resent += 1;
                }
                Err(e) => warn!(peer = %recipient, message_id = %id, error = %e, "resend failed"),
            }
        }
        report
    }

    /// Number of direct messages still awaiting acknowledgment.
    pub fn pending_acks(&self) -> usize {
        self.state().acks.len()
    }

    pub fn is_awaiting_ack(&self, id: &MessageId) -> bool {
        self.state().acks.is_pending(id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Process one inbound message from `origin`.
    ///
    /// Messages are logged and dropped before any dispatch when the peer has
    /// no known signing key, the signature does not verify, the claimed
    /// sender address is not the one derived from that key, or the timestamp
    /// is not a finite number.
    pub async fn handle_incoming(&self, message: Message, origin: Peer) {
        let Some(public_key) = origin.public_key else {
            warn!(peer = %origin.id, message_id = %message.id, "no public key for peer, dropping");
            return;
        };
        if !message.verify(&public_key) {
            warn!(peer = %origin.id, message_id = %message.id, "invalid signature, dropping");
            return;
        }
        if Address::derive(&public_key) != message.sender {
            warn!(peer = %origin.id, message_id = %message.id, sender = %message.sender, "sender address does not match peer key, dropping");
            return;
        }
        if !message.timestamp.is_finite() {
            warn!(peer = %origin.id, message_id = %message.id, "non-finite timestamp, dropping");
            return;
        }

        let msg_type = message.msg_type;
        match msg_type {
            MessageType::Text => self.handle_text(message, &origin).await,
            MessageType::Ack => self.handle_ack(&message, &origin),
            MessageType::StreamStart | MessageType::StreamChunk | MessageType::StreamEnd => {
                self.handle_stream(message, &origin)
            }
        }
    }

    async fn handle_text(&self, message: Message, origin: &Peer) {
        let Some(text) = self.open_text(&message, origin) else {
            return;
        };
        let first_seen = self.state().recent.insert(&message.id);
        if !first_seen {
            debug!(peer = %origin.id, message_id = %message.id, "duplicate message, re-acknowledging");
            self.acknowledge(&message, origin).await;
            return;
        }

        let received = ReceivedMessage {
            id: message.id.clone(),
            sender: message.sender.clone(),
            sender_name: message.sender_name().map(str::to_string),
            content: text,
            timestamp: message.timestamp,
            verified: true,
        };
        self.record(LedgerEntry::Received {
            id: message.id.clone(),
            sender: message.sender.clone(),
            timestamp: message.timestamp,
        });
        info!(peer = %origin.id, message_id = %message.id, "received message");

        self.notify(&received).await;
        self.acknowledge(&message, origin).await;
    }

    /// Decrypt if needed and decode as UTF-8. `None` means drop.
    fn open_text(&self, message: &Message, origin: &Peer) -> Option<String> {
        let content = match &message.nonce {
            None => message.content.to_vec(),
            Some(nonce_bytes) => {
                let Some(secret) = self.get_shared_secret(origin) else {
                    warn!(peer = %origin.id, message_id = %message.id, "encrypted message from peer without encryption key");
                    return None;
                };
                let opened = Nonce::from_slice(nonce_bytes)
                    .and_then(|nonce| decrypt(&message.content, &secret, &nonce));
                match opened {
                    Ok(plaintext) => plaintext,
                    Err(e) => {
                        warn!(peer = %origin.id, message_id = %message.id, error = %e, "failed to decrypt message");
                        return None;
                    }
                }
            }
        };

        match String::from_utf8(content) {
            Ok(text) => Some(text),
            Err(_) => {
                warn!(peer = %origin.id, message_id = %message.id, "message content is not valid UTF-8");
                None
            }
        }
    }

    async fn notify(&self, received: &ReceivedMessage) {
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            if let Err(e) = observer.on_message(received).await {
                error!(message_id = %received.id, error = %e, "message observer failed");
            }
        }
    }

    async fn acknowledge(&self, message: &Message, origin: &Peer) {
        let mut ack = Message::ack(
            self.wallet.address().clone(),
            Recipient::from(&message.sender),
            &message.id,
        );
        if let Err(e) = ack.sign(self.wallet.signing_keypair()) {
            error!(error = %e, "failed to sign acknowledgment");
            return;
        }
        if let Err(e) = self.directory.send_message(ack, &origin.id).await {
            warn!(peer = %origin.id, message_id = %message.id, error = %e, "failed to send acknowledgment");
        }
    }

    fn handle_ack(&self, message: &Message, origin: &Peer) {
        let Some(id) = message.acked_message_id() else {
            warn!(peer = %origin.id, "malformed acknowledgment");
            return;
        };
        let mut state = self.state();
        if state.acks.acknowledge(&id, &origin.id) {
            debug!(peer = %origin.id, message_id = %id, "delivery acknowledged");
        } else if state.acks.is_pending(&id) {
            warn!(peer = %origin.id, message_id = %id, "acknowledgment from a peer other than the recipient");
        } else {
            debug!(peer = %origin.id, message_id = %id, "acknowledgment for untracked message");
        }
    }

    fn handle_stream(&self, message: Message, origin: &Peer) {
        let Some(info) = message.chunk_info else {
            warn!(peer = %origin.id, message_id = %message.id, "stream message without chunk info");
            return;
        };
        let stream_id = info.stream_id.clone();
        let chunk = Chunk {
            stream_id: info.stream_id,
            sequence: info.sequence,
            total: info.total,
            data: message.content,
        };

        let mut state = self.state();
        match state.reassembler.add(chunk) {
            Ok(Some(data)) => {
                info!(peer = %origin.id, stream = %stream_id, bytes = data.len(), "stream complete");
                state.completed.push(CompletedStream {
                    stream_id,
                    sender: message.sender,
                    data,
                });
            }
            Ok(None) => {}
            Err(e) => warn!(peer = %origin.id, stream = %stream_id, error = %e, "rejected stream chunk"),
        }
    }

    /// Drain the streams completed since the last call.
    pub fn take_completed_streams(&self) -> Vec<CompletedStream> {
        mem::take(&mut self.state().completed)
    }

    /// Drop partial inbound streams past their age limit.
    pub fn expire_streams(&self) -> usize {
        self.state().reassembler.expire_now()
    }

    /// Process inbound messages until `shutdown` turns true or the directory
    /// closes.
    ///
    /// A message already received is processed to completion before the
    /// shutdown signal is checked again. A dropped shutdown sender also stops
    /// the loop.
    pub async fn listen(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(peer = %self.wallet.peer_id(), "listening");
        loop {
            let stopping = *shutdown.borrow_and_update();
            if stopping {
                break;
            }

            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = self.directory.recv() => next?,
            };

            match next {
                Some(Inbound { message, origin }) => self.handle_incoming(message, origin).await,
                None => {
                    info!("directory closed");
                    break;
                }
            }
        }
        info!(peer = %self.wallet.peer_id(), "stopped listening");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger
    // ─────────────────────────────────────────────────────────────────────────

    /// Mine pending ledger entries into a block.
    ///
    /// Blocks the calling thread for the duration of the proof-of-work.
    pub fn mine_pending(&self) -> Result<Option<Block>> {
        let block = self.lock_ledger().mine_pending()?;
        log_mined(block.as_ref());
        Ok(block)
    }

    /// Like [`TransmissionEngine::mine_pending`], abandoned once `cancel` is set.
    pub fn mine_pending_cancellable(&self, cancel: &CancelFlag) -> Result<Option<Block>> {
        let block = self.lock_ledger().mine_pending_with(cancel)?;
        log_mined(block.as_ref());
        Ok(block)
    }

    /// Every mined ledger entry, oldest first.
    pub fn message_history(&self) -> Vec<LedgerEntry> {
        self.lock_ledger().messages()
    }
}

fn log_mined(block: Option<&Block>) {
    match block {
        Some(block) => info!(index = block.index, hash = %block.hash, "mined block"),
        None => debug!("nothing to mine"),
    }
}
