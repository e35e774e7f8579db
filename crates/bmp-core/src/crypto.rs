//! Crypto envelope: signing, key exchange and authenticated encryption.
//!
//! Two independent key families are used. Ed25519 keys sign messages and
//! X25519 keys perform Diffie-Hellman key agreement; a signing key is never
//! used for key exchange. Message confidentiality uses ChaCha20-Poly1305
//! under a key derived from the X25519 shared secret.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce as AeadNonce,
};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{CoreError, Result};

/// Key-derivation context turning a DH shared secret into an AEAD key.
const ENCRYPTION_KDF_CONTEXT: &str = "bmp-v0 message encryption";

/// Length of an AEAD nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Signing
// ─────────────────────────────────────────────────────────────────────────────

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigningPublicKey(pub [u8; 32]);

impl SigningPublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// Verify a signature over a message.
    ///
    /// Fails closed: malformed signature bytes, an invalid key or a mismatch
    /// all yield `false`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        self.verify_strict_result(message, signature).is_ok()
    }

    /// Verify a signature, reporting why it failed.
    ///
    /// Uses strict verification: small-order keys and non-canonical
    /// signature encodings are rejected.
    pub fn verify_strict_result(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        let sig_bytes: [u8; SIGNATURE_LEN] =
            signature.try_into().map_err(|_| CoreError::InvalidSignature)?;
        let sig = DalekSignature::from_bytes(&sig_bytes);
        verifying_key
            .verify_strict(message, &sig)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Pub({})", &self.to_hex()[..16])
    }
}

impl From<[u8; 32]> for SigningPublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_LEN]);

impl Signature {
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ed25519Sig({}...)", &hex::encode(self.0)[..16])
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An Ed25519 key pair used only for signing.
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
}

impl SigningKeypair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> SigningPublicKey {
        SigningPublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message. Ed25519 signing is deterministic.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Raw seed bytes (secret key material).
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKeypair({:?})", self.public_key())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key exchange
// ─────────────────────────────────────────────────────────────────────────────

/// An X25519 public key (32 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptionPublicKey(pub [u8; 32]);

impl EncryptionPublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519Pub({})", &self.to_hex()[..16])
    }
}

impl From<PublicKey> for EncryptionPublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static key pair used only for key agreement.
#[derive(Clone)]
pub struct EncryptionKeypair {
    secret: StaticSecret,
}

impl EncryptionKeypair {
    /// Generate a new random key pair.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Create from secret bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self {
            secret: StaticSecret::from(bytes),
        }
    }

    pub fn public_key(&self) -> EncryptionPublicKey {
        EncryptionPublicKey::from(PublicKey::from(&self.secret))
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Fails with [`CoreError::WeakPublicKey`] when the peer key has low
    /// order and the output would not depend on our secret.
    pub fn diffie_hellman(&self, peer_public: &EncryptionPublicKey) -> Result<SharedSecret> {
        let shared = self.secret.diffie_hellman(&peer_public.to_dalek());
        if !shared.was_contributory() {
            return Err(CoreError::WeakPublicKey);
        }
        Ok(SharedSecret(*shared.as_bytes()))
    }
}

impl fmt::Debug for EncryptionKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKeypair({:?})", self.public_key())
    }
}

/// A symmetric secret shared by two peers.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The AEAD key for message encryption, domain-separated from the raw DH output.
    fn message_key(&self) -> [u8; 32] {
        blake3::derive_key(ENCRYPTION_KDF_CONTEXT, &self.0)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// Generate a fresh random nonce.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    /// Parse a nonce from wire bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; NONCE_LEN] = bytes.try_into().map_err(|_| CoreError::InvalidNonce {
            expected: NONCE_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envelope operations
// ─────────────────────────────────────────────────────────────────────────────

pub fn generate_signing_keypair() -> SigningKeypair {
    SigningKeypair::generate()
}

pub fn generate_encryption_keypair() -> EncryptionKeypair {
    EncryptionKeypair::generate()
}

/// Sign `message` with a private signing key.
pub fn sign(message: &[u8], keypair: &SigningKeypair) -> Signature {
    keypair.sign(message)
}

/// Verify `signature` over `message`. Never errors; malformed input is `false`.
pub fn verify(message: &[u8], signature: &[u8], public_key: &SigningPublicKey) -> bool {
    public_key.verify(message, signature)
}

/// Derive the secret shared between `own` and the holder of `peer_public`.
///
/// Symmetric: `derive(a, B) == derive(b, A)`. Low-order peer keys are
/// rejected.
pub fn derive_shared_secret(
    own: &EncryptionKeypair,
    peer_public: &EncryptionPublicKey,
) -> Result<SharedSecret> {
    own.diffie_hellman(peer_public)
}

/// Encrypt `plaintext` under `secret` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], secret: &SharedSecret) -> Result<(Nonce, Vec<u8>)> {
    let cipher = ChaCha20Poly1305::new_from_slice(&secret.message_key())
        .map_err(|e| CoreError::Encryption(e.to_string()))?;
    let nonce = Nonce::generate();
    let ciphertext = cipher
        .encrypt(AeadNonce::from_slice(&nonce.0), plaintext)
        .map_err(|e| CoreError::Encryption(e.to_string()))?;
    Ok((nonce, ciphertext))
}

/// Decrypt and authenticate `ciphertext`.
///
/// Returns [`CoreError::Decryption`] when the ciphertext was tampered with,
/// produced under another secret, or paired with the wrong nonce.
pub fn decrypt(ciphertext: &[u8], secret: &SharedSecret, nonce: &Nonce) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new_from_slice(&secret.message_key())
        .map_err(|e| CoreError::Decryption(e.to_string()))?;
    cipher
        .decrypt(AeadNonce::from_slice(&nonce.0), ciphertext)
        .map_err(|e| CoreError::Decryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = SigningKeypair::generate();
        let message = b"hello world";
        let signature = sign(message, &keypair);

        assert!(verify(message, signature.as_ref(), &keypair.public_key()));
        assert!(!verify(b"hello worlD", signature.as_ref(), &keypair.public_key()));
    }

    #[test]
    fn test_verify_fails_closed_on_malformed_signature() {
        let keypair = SigningKeypair::generate();
        let pk = keypair.public_key();
        assert!(!verify(b"msg", &[], &pk));
        assert!(!verify(b"msg", &[0u8; 63], &pk));
        assert!(!verify(b"msg", &[0xff; 64], &pk));
        assert!(!verify(b"msg", &[0u8; 65], &pk));
    }

    #[test]
    fn test_verify_wrong_key() {
        let alice = SigningKeypair::generate();
        let bob = SigningKeypair::generate();
        let signature = alice.sign(b"msg");
        assert!(!verify(b"msg", signature.as_ref(), &bob.public_key()));
    }

    #[test]
    fn test_signing_deterministic_from_seed() {
        let kp1 = SigningKeypair::from_seed(&[0x42; 32]);
        let kp2 = SigningKeypair::from_seed(&[0x42; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
        assert_eq!(kp1.sign(b"same"), kp2.sign(b"same"));
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let pk = SigningKeypair::generate().public_key();
        assert_eq!(SigningPublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert!(SigningPublicKey::from_hex("abcd").is_err());
    }

    #[test]
    fn test_shared_secret_symmetric() {
        let alice = generate_encryption_keypair();
        let bob = generate_encryption_keypair();

        let ab = derive_shared_secret(&alice, &bob.public_key()).unwrap();
        let ba = derive_shared_secret(&bob, &alice.public_key()).unwrap();
        assert_eq!(ab, ba);

        let carol = generate_encryption_keypair();
        assert_ne!(ab, derive_shared_secret(&alice, &carol.public_key()).unwrap());
    }

    #[test]
    fn test_low_order_peer_key_rejected() {
        let own = generate_encryption_keypair();
        // Low-order points force an all-zero output.
        let mut order_two = [0u8; 32];
        order_two[0] = 1;
        for weak in [[0u8; 32], order_two] {
            assert!(matches!(
                derive_shared_secret(&own, &EncryptionPublicKey::from_bytes(weak)),
                Err(CoreError::WeakPublicKey)
            ));
        }
    }

    #[test]
    fn test_strict_verify_rejects_small_order_key() {
        // The identity point: a non-strict verifier accepts this signature for
        // any message.
        let mut identity = [0u8; 32];
        identity[0] = 1;
        let mut signature = [0u8; SIGNATURE_LEN];
        signature[0] = 1;
        let key = SigningPublicKey::from_bytes(identity);
        assert!(key.verify_strict_result(b"anything", &signature).is_err());
        assert!(!verify(b"anything", &signature, &key));
    }

    #[test]
    fn test_encrypt_decrypt() {
        let secret = SharedSecret::from_bytes([7; 32]);
        let (nonce, ciphertext) = encrypt(b"hello, world!", &secret).unwrap();
        assert_ne!(ciphertext, b"hello, world!");
        assert_eq!(decrypt(&ciphertext, &secret, &nonce).unwrap(), b"hello, world!");
    }

    #[test]
    fn test_nonce_fresh_per_call() {
        let secret = SharedSecret::from_bytes([7; 32]);
        let (n1, c1) = encrypt(b"same", &secret).unwrap();
        let (n2, c2) = encrypt(b"same", &secret).unwrap();
        assert_ne!(n1, n2);
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_decrypt_wrong_secret_fails() {
        let (nonce, ciphertext) = encrypt(b"secret", &SharedSecret::from_bytes([1; 32])).unwrap();
        let result = decrypt(&ciphertext, &SharedSecret::from_bytes([2; 32]), &nonce);
        assert!(matches!(result, Err(CoreError::Decryption(_))));
    }

    #[test]
    fn test_decrypt_wrong_nonce_fails() {
        let secret = SharedSecret::from_bytes([1; 32]);
        let (_, ciphertext) = encrypt(b"secret", &secret).unwrap();
        assert!(decrypt(&ciphertext, &secret, &Nonce::generate()).is_err());
    }

    #[test]
    fn test_decrypt_tampered_fails() {
        let secret = SharedSecret::from_bytes([1; 32]);
        let (nonce, mut ciphertext) = encrypt(b"secret", &secret).unwrap();
        ciphertext[0] ^= 0x01;
        assert!(decrypt(&ciphertext, &secret, &nonce).is_err());
    }

    #[test]
    fn test_nonce_from_slice_length() {
        assert!(Nonce::from_slice(&[0u8; NONCE_LEN]).is_ok());
        assert!(matches!(
            Nonce::from_slice(&[0u8; 8]),
            Err(CoreError::InvalidNonce { expected: 12, actual: 8 })
        ));
    }

    #[test]
    fn test_shared_secret_debug_redacted() {
        let secret = SharedSecret::from_bytes([0x42; 32]);
        assert!(!format!("{:?}", secret).contains("42"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn encrypt_decrypt_roundtrip(plaintext in prop::collection::vec(any::<u8>(), 0..2048),
                                     secret in any::<[u8; 32]>()) {
            let secret = SharedSecret::from_bytes(secret);
            let (nonce, ciphertext) = encrypt(&plaintext, &secret).unwrap();
            prop_assert_eq!(decrypt(&ciphertext, &secret, &nonce).unwrap(), plaintext);
        }

        #[test]
        fn single_bit_mutation_breaks_signature(message in prop::collection::vec(any::<u8>(), 1..256),
                                                seed in any::<[u8; 32]>(),
                                                bit in any::<usize>(),
                                                in_signature in any::<bool>()) {
            let keypair = SigningKeypair::from_seed(&seed);
            let pk = keypair.public_key();
            let signature = keypair.sign(&message).to_vec();
            prop_assert!(verify(&message, &signature, &pk));

            let mut message = message;
            let mut signature = signature;
            let target = if in_signature { &mut signature } else { &mut message };
            let bit = bit % (target.len() * 8);
            target[bit / 8] ^= 1 << (bit % 8);
            prop_assert!(!verify(&message, &signature, &pk));
        }

        #[test]
        fn shared_secret_symmetry(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            let alice = EncryptionKeypair::from_bytes(a);
            let bob = EncryptionKeypair::from_bytes(b);
            prop_assert_eq!(
                derive_shared_secret(&alice, &bob.public_key()).unwrap(),
                derive_shared_secret(&bob, &alice.public_key()).unwrap()
            );
        }
    }
}
