use std::collections::HashMap;

use crate::models::error::VaultError;

/// Byte-level authenticated encryption primitive.
///
/// Implemented by [`KeyManager`](crate::crypto::key_manager::KeyManager)
/// with AES-256-GCM. Sealed format:
/// ```text
/// [12-byte nonce] [ciphertext] [16-byte GCM authentication tag]
/// ```
/// Implementations must be safe to call concurrently and must use a fresh
/// random nonce on every `encrypt` call.
pub trait PayloadCipher: Send + Sync {
    /// Returns: `nonce (12 bytes) || ciphertext || tag (16 bytes)`
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Fails with [`VaultError::Authentication`] when the tag does not verify.
    /// Never returns partially decrypted data.
    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Metadata about the key (e.g. key id, backing store). Never key bytes.
    fn key_metadata(&self) -> HashMap<String, String>;

    /// Algorithm identifier (e.g., "AES-256-GCM").
    fn algorithm(&self) -> &str;
}
