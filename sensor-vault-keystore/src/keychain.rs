//! macOS Keychain backend.
//!
//! The vault key is a generic password item (service + alias), stored
//! hex-encoded. Keychain items are protected by the Secure Enclave on Apple
//! silicon; Intel Macs are reported as not hardware backed.

use security_framework::passwords::{delete_generic_password, get_generic_password, set_generic_password};
use sensor_vault_core::{KeyMaterial, KeyStore, VaultError};

use crate::{decode_key, encode_key};

/// errSecItemNotFound
const ITEM_NOT_FOUND: i32 = -25300;

pub struct KeychainKeyStore {
    service: String,
}

impl KeychainKeyStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }
}

impl KeyStore for KeychainKeyStore {
    fn is_available(&self) -> bool {
        true
    }

    fn is_hardware_backed(&self) -> bool {
        cfg!(target_arch = "aarch64")
    }

    fn load_key(&self, alias: &str) -> Result<Option<KeyMaterial>, VaultError> {
        match get_generic_password(&self.service, alias) {
            Ok(data) => {
                log::debug!("loaded vault key {} from keychain", alias);
                decode_key(&data).map(Some)
            }
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(VaultError::KeyProvisioning(format!("keychain read failed: {}", e))),
        }
    }

    fn store_key(&self, alias: &str, key: &KeyMaterial) -> Result<(), VaultError> {
        let encoded = encode_key(key);
        set_generic_password(&self.service, alias, encoded.as_bytes())
            .map_err(|e| VaultError::KeyProvisioning(format!("keychain write failed: {}", e)))?;
        log::info!("stored vault key {} in keychain", alias);
        Ok(())
    }

    fn delete_key(&self, alias: &str) -> Result<(), VaultError> {
        match delete_generic_password(&self.service, alias) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(()),
            Err(e) => Err(VaultError::KeyProvisioning(format!("keychain delete failed: {}", e))),
        }
    }

    fn description(&self) -> String {
        format!("macOS Keychain (service {})", self.service)
    }
}
