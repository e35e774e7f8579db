//! # BMP
//!
//! The transmission engine for BMP - signed, optionally encrypted messaging
//! between peers, with every exchange recorded on a proof-of-work ledger.
//!
//! ## Overview
//!
//! - **Messages**: Signed with Ed25519; direct text is encrypted with
//!   ChaCha20-Poly1305 under an X25519 shared secret
//! - **Acknowledgments**: Every accepted text message is acknowledged;
//!   unacknowledged sends are retried and eventually abandoned
//! - **Streams**: Large payloads travel as signed chunks and are reassembled
//!   on arrival
//! - **Ledger**: Sends, broadcasts and receipts are appended to a hash-linked
//!   chain of mined blocks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bmp::{EngineConfig, TransmissionEngine};
//! use bmp::core::Wallet;
//! use bmp::directory::memory::MemoryNetwork;
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let alice = Wallet::generate("Alice");
//!     let bob = Wallet::generate("Bob");
//!
//!     let directory = network.join(alice.peer_id()).await;
//!     directory.add_peer(bob.as_peer("127.0.0.1", 8001));
//!
//!     let engine =
//!         TransmissionEngine::new(alice, Arc::new(directory), EngineConfig::default()).unwrap();
//!     engine.send(&bob.peer_id(), "hello").await;
//!     engine.mine_pending().unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `bmp::core` - Identities, crypto and the signed message
//! - `bmp::ledger` - Blocks, chain validation and persistence
//! - `bmp::chunk` - Stream chunking and reassembly

pub mod acks;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod observer;

pub use bmp_chunk as chunk;
pub use bmp_core as core;
pub use bmp_ledger as ledger;

pub use acks::{DueAcks, PendingAcks};
pub use config::{AckConfig, EngineConfig};
pub use directory::{Inbound, PeerDirectory};
pub use engine::{CompletedStream, RetryReport, TransmissionEngine};
pub use error::{DirectoryError, EngineError, Result};
pub use observer::{ChannelObserver, MessageObserver, ReceivedMessage};

pub use bmp_core::{Message, MessageId, MessageType, Peer, PeerId, Wallet};
pub use bmp_ledger::{Block, Blockchain, LedgerEntry};
