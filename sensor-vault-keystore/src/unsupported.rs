//! Placeholder for platforms without a supported hardware key store.
//!
//! There is no software fallback: opening a vault with this
//! store fails with a key provisioning error.

use sensor_vault_core::{KeyMaterial, KeyStore, VaultError};

#[derive(Debug, Default)]
pub struct UnsupportedKeyStore;

impl UnsupportedKeyStore {
    pub fn new() -> Self {
        Self
    }

    fn unavailable(&self) -> VaultError {
        VaultError::KeyProvisioning(format!(
            "no hardware-backed key store on {}",
            std::env::consts::OS
        ))
    }
}

impl KeyStore for UnsupportedKeyStore {
    fn is_available(&self) -> bool {
        false
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn load_key(&self, _alias: &str) -> Result<Option<KeyMaterial>, VaultError> {
        Err(self.unavailable())
    }

    fn store_key(&self, _alias: &str, _key: &KeyMaterial) -> Result<(), VaultError> {
        Err(self.unavailable())
    }

    fn delete_key(&self, _alias: &str) -> Result<(), VaultError> {
        Ok(())
    }

    fn description(&self) -> String {
        format!("unsupported platform ({})", std::env::consts::OS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_vault_core::{CaptureOrchestrator, KeyManager, VaultConfiguration};

    #[test]
    fn reports_unavailable() {
        let store = UnsupportedKeyStore::new();
        assert!(!store.is_available());
        assert!(matches!(store.load_key("k"), Err(VaultError::KeyProvisioning(_))));
        assert!(store.delete_key("k").is_ok());
    }

    #[test]
    fn vault_refuses_to_open() {
        let store = UnsupportedKeyStore::new();
        assert!(matches!(
            KeyManager::new(&store, "k"),
            Err(VaultError::KeyProvisioning(_))
        ));
        let result = CaptureOrchestrator::open(VaultConfiguration::new("/nonexistent"), &store);
        assert!(matches!(result.err(), Some(VaultError::KeyProvisioning(_))));
    }
}
