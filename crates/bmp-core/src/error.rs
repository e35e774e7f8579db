//! Error types for BMP core primitives.

use thiserror::Error;

/// Errors raised by the crypto envelope and message encoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    /// A low-order X25519 key whose shared secret would not be contributory.
    #[error("weak public key for key exchange")]
    WeakPublicKey,

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication failure: tampered ciphertext, wrong secret or wrong nonce.
    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonce { expected: usize, actual: usize },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
