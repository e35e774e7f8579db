//! # BMP Testkit
//!
//! Testing utilities for BMP.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed Merkle roots and block hashes for cross-implementation checks
//! - **Generators**: Proptest strategies for messages, payloads and ledger entries
//! - **Fixtures**: Seeded wallets, connected engine pairs and pre-mined ledgers
//!
//! ## Golden Vectors
//!
//! ```rust
//! use bmp_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, computed) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, computed);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use bmp_testkit::generators::{message_from_params, MessageParams};
//!
//! proptest! {
//!     #[test]
//!     fn signed_messages_verify(params: MessageParams) {
//!         let message = message_from_params(&params);
//!         prop_assert!(message.verify(&params.wallet.signing_public_key()));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use bmp_testkit::fixtures::mined_chain;
//!
//! let chain = mined_chain(1, 2, 5);
//! assert!(chain.validate());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{fast_config, mined_chain, multi_party_wallets, seeded_wallet, EnginePair};
pub use generators::{message_from_params, MessageParams};
pub use vectors::{block_vectors, merkle_vectors, verify_all_vectors, BlockVector, MerkleVector};
