//! Test doubles shared by the inline test modules.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::crypto::encryption_service::EncryptionService;
use crate::crypto::key_manager::{KeyManager, KeyMaterial};
use crate::models::error::VaultError;
use crate::traits::encryptor::PayloadCipher;
use crate::traits::key_store::KeyStore;

/// In-memory key store that claims to be hardware backed.
pub(crate) struct MemoryKeyStore {
    keys: Mutex<HashMap<String, KeyMaterial>>,
    available: bool,
    hardware_backed: bool,
    fail_writes: bool,
}

impl MemoryKeyStore {
    pub(crate) fn new() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            available: true,
            hardware_backed: true,
            fail_writes: false,
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub(crate) fn software_only() -> Self {
        Self {
            hardware_backed: false,
            ..Self::new()
        }
    }

    pub(crate) fn failing_writes(self) -> Self {
        Self {
            fail_writes: true,
            ..self
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.lock().len()
    }
}

impl KeyStore for MemoryKeyStore {
    fn is_available(&self) -> bool {
        self.available
    }

    fn is_hardware_backed(&self) -> bool {
        self.hardware_backed
    }

    fn load_key(&self, alias: &str) -> Result<Option<KeyMaterial>, VaultError> {
        Ok(self.keys.lock().get(alias).cloned())
    }

    fn store_key(&self, alias: &str, key: &KeyMaterial) -> Result<(), VaultError> {
        if self.fail_writes {
            return Err(VaultError::Persistence("secure element rejected write".into()));
        }
        self.keys.lock().insert(alias.to_string(), key.clone());
        Ok(())
    }

    fn delete_key(&self, alias: &str) -> Result<(), VaultError> {
        self.keys.lock().remove(alias);
        Ok(())
    }

    fn description(&self) -> String {
        "in-memory test store".into()
    }
}

pub(crate) fn encryption_service() -> Arc<EncryptionService> {
    let manager = KeyManager::new(&MemoryKeyStore::new(), "test-key").unwrap();
    Arc::new(EncryptionService::new(Arc::new(manager)))
}

/// Cipher whose every call fails, for exercising error paths.
pub(crate) struct FailingCipher;

impl PayloadCipher for FailingCipher {
    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        Err(VaultError::Encryption("secure element busy".into()))
    }

    fn decrypt(&self, _sealed: &[u8]) -> Result<Vec<u8>, VaultError> {
        Err(VaultError::Authentication)
    }

    fn key_metadata(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn algorithm(&self) -> &str {
        "FAILING"
    }
}
