//! AES-256-GCM key manager backed by a hardware key store.
//!
//! The key is provisioned once at construction. After that the manager only
//! holds the cipher state; every call is self-contained with a fresh random
//! nonce, so one instance can be shared across threads without locking.

use std::collections::HashMap;
use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::models::error::VaultError;
use crate::traits::encryptor::PayloadCipher;
use crate::traits::key_store::KeyStore;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

pub const ALGORITHM: &str = "AES-256-GCM";

/// A 256-bit symmetric key. Zeroized on drop and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_SIZE]);

impl KeyMaterial {
    /// Generate a new key from the OS random number generator.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, VaultError> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            VaultError::KeyProvisioning(format!(
                "stored key has wrong length: {} (expected {})",
                bytes.len(),
                KEY_SIZE
            ))
        })?;
        Ok(Self::from_bytes(array))
    }

    /// Raw key bytes, for key store backends that persist the key.
    pub fn expose_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Owns the vault key and exposes authenticated encryption of byte buffers
/// and strings.
pub struct KeyManager {
    cipher: Aes256Gcm,
    key_id: String,
    backend: String,
}

impl KeyManager {
    /// Provision (if needed) and load the key stored under `alias`.
    ///
    /// Fails with [`VaultError::KeyProvisioning`] when the store is
    /// unavailable or not hardware backed. There is no software fallback.
    pub fn new(store: &dyn KeyStore, alias: &str) -> Result<Self, VaultError> {
        let key = Self::ensure_key(store, alias)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.expose_bytes()));

        log::debug!("key manager ready (alias {}, backend {})", alias, store.description());
        Ok(Self {
            cipher,
            key_id: alias.to_string(),
            backend: store.description(),
        })
    }

    /// Idempotently provision the key under `alias` and return it.
    pub fn ensure_key(store: &dyn KeyStore, alias: &str) -> Result<KeyMaterial, VaultError> {
        if !store.is_available() {
            return Err(VaultError::KeyProvisioning(format!(
                "secure key store unavailable: {}",
                store.description()
            )));
        }
        if !store.is_hardware_backed() {
            return Err(VaultError::KeyProvisioning(format!(
                "key store is not hardware backed: {}",
                store.description()
            )));
        }

        match store.load_key(alias).map_err(into_provisioning)? {
            Some(key) => Ok(key),
            None => {
                log::info!("provisioning new vault key under alias {}", alias);
                let key = KeyMaterial::generate();
                store.store_key(alias, &key).map_err(into_provisioning)?;
                Ok(key)
            }
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn encrypt_string(&self, plaintext: &str) -> Result<Vec<u8>, VaultError> {
        self.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt_to_string(&self, sealed: &[u8]) -> Result<String, VaultError> {
        let bytes = self.decrypt(sealed)?;
        String::from_utf8(bytes).map_err(|e| VaultError::Decryption(format!("plaintext is not UTF-8: {}", e)))
    }
}

impl PayloadCipher for KeyManager {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| VaultError::Encryption(format!("AES-GCM encryption failed: {}", e)))?;

        // aes-gcm already appends the tag to ciphertext, so just prepend nonce.
        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(combined)
    }

    fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, VaultError> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(VaultError::Decryption(format!(
                "ciphertext too short: {} bytes",
                sealed.len()
            )));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::Authentication)
    }

    fn key_metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("keyId".to_string(), self.key_id.clone()),
            ("algorithm".to_string(), ALGORITHM.to_string()),
            ("backend".to_string(), self.backend.clone()),
        ])
    }

    fn algorithm(&self) -> &str {
        ALGORITHM
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("key_id", &self.key_id)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

fn into_provisioning(err: VaultError) -> VaultError {
    match err {
        VaultError::KeyProvisioning(_) => err,
        other => VaultError::KeyProvisioning(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryKeyStore;
    use std::sync::Arc;
    use std::thread;

    fn manager() -> KeyManager {
        KeyManager::new(&MemoryKeyStore::new(), "test-key").unwrap()
    }

    #[test]
    fn round_trip() {
        let km = manager();
        let sealed = km.encrypt(b"hello, sensor vault").unwrap();
        assert_eq!(km.decrypt(&sealed).unwrap(), b"hello, sensor vault");
    }

    #[test]
    fn nonce_is_prepended_and_fresh() {
        let km = manager();
        let a = km.encrypt(b"same plaintext").unwrap();
        let b = km.encrypt(b"same plaintext").unwrap();

        assert_eq!(a.len(), NONCE_SIZE + 14 + TAG_SIZE);
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn flipped_bit_fails_authentication() {
        let km = manager();
        let mut sealed = km.encrypt(b"important").unwrap();
        sealed[NONCE_SIZE + 1] ^= 0x01;

        assert_eq!(km.decrypt(&sealed), Err(VaultError::Authentication));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let a = KeyManager::new(&MemoryKeyStore::new(), "k").unwrap();
        let b = KeyManager::new(&MemoryKeyStore::new(), "k").unwrap();

        let sealed = a.encrypt(b"secret").unwrap();
        assert_eq!(b.decrypt(&sealed), Err(VaultError::Authentication));
    }

    #[test]
    fn short_input_is_a_decryption_error() {
        let km = manager();
        assert!(matches!(km.decrypt(&[0u8; 10]), Err(VaultError::Decryption(_))));
    }

    #[test]
    fn empty_plaintext_works() {
        let km = manager();
        let sealed = km.encrypt(b"").unwrap();
        assert!(km.decrypt(&sealed).unwrap().is_empty());
    }

    #[test]
    fn strings_round_trip() {
        let km = manager();
        let sealed = km.encrypt_string("{\"latitude\":1.0}").unwrap();
        assert_eq!(km.decrypt_to_string(&sealed).unwrap(), "{\"latitude\":1.0}");
    }

    #[test]
    fn ensure_key_is_idempotent() {
        let store = MemoryKeyStore::new();
        let first = KeyManager::new(&store, "alias").unwrap();
        let second = KeyManager::new(&store, "alias").unwrap();

        let sealed = first.encrypt(b"shared").unwrap();
        assert_eq!(second.decrypt(&sealed).unwrap(), b"shared");
        assert_eq!(store.key_count(), 1);
    }

    #[test]
    fn unavailable_store_is_fatal() {
        let err = KeyManager::new(&MemoryKeyStore::unavailable(), "k").unwrap_err();
        assert!(matches!(err, VaultError::KeyProvisioning(_)));
    }

    #[test]
    fn software_store_is_rejected() {
        let err = KeyManager::new(&MemoryKeyStore::software_only(), "k").unwrap_err();
        assert!(matches!(err, VaultError::KeyProvisioning(_)));
    }

    #[test]
    fn store_failures_become_provisioning_errors() {
        let store = MemoryKeyStore::new().failing_writes();
        let err = KeyManager::new(&store, "k").unwrap_err();
        assert!(matches!(err, VaultError::KeyProvisioning(_)));
    }

    #[test]
    fn shared_manager_is_safe_across_threads() {
        let km = Arc::new(manager());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let km = Arc::clone(&km);
                thread::spawn(move || {
                    for i in 0..50 {
                        let plaintext = format!("thread {} message {}", t, i);
                        let sealed = km.encrypt(plaintext.as_bytes()).unwrap();
                        assert_eq!(km.decrypt(&sealed).unwrap(), plaintext.as_bytes());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn metadata_never_contains_key_bytes() {
        let km = manager();
        let meta = km.key_metadata();
        assert_eq!(meta.get("keyId").map(String::as_str), Some("test-key"));
        assert_eq!(km.algorithm(), "AES-256-GCM");
        assert_eq!(format!("{:?}", KeyMaterial::generate()), "KeyMaterial(<redacted>)");
    }

    #[test]
    fn key_material_length_is_checked() {
        assert!(KeyMaterial::from_slice(&[1u8; 16]).is_err());
        assert!(KeyMaterial::from_slice(&[1u8; 32]).is_ok());
    }
}
