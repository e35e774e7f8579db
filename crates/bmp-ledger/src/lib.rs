//! # BMP Ledger
//!
//! A local, single-writer, proof-of-work protected log of message activity.
//!
//! The ledger is tamper-evident rather than consensus-backed: every block
//! commits to its predecessor's hash and must satisfy a leading-zero target,
//! so editing any stored block is detected by [`Blockchain::validate`].
//!
//! ## Key Types
//!
//! - [`Blockchain`] - The chain plus its pending-entry buffer
//! - [`Block`] - One mined block
//! - [`LedgerEntry`] - Typed record of a message event
//! - [`CancelFlag`] - Cooperative cancellation for mining

pub mod block;
pub mod chain;
pub mod entry;
pub mod error;
pub mod merkle;
pub mod persistence;

pub use block::{meets_difficulty, Block, CancelFlag, MAX_DIFFICULTY, MINING_CHECK_INTERVAL, ZERO_HASH};
pub use chain::{Blockchain, DEFAULT_DIFFICULTY};
pub use entry::{BlockData, LedgerEntry};
pub use error::{LedgerError, Result};
pub use merkle::calculate_merkle_root;
pub use persistence::LedgerDocument;
