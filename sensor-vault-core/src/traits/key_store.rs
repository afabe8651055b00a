use crate::crypto::key_manager::KeyMaterial;
use crate::models::error::VaultError;

/// Secure storage for the vault's symmetric key.
///
/// Implemented by platform backends in `sensor-vault-keystore`. The key
/// manager refuses to run on a store that is unavailable or that does not
/// report itself as hardware backed.
pub trait KeyStore: Send + Sync {
    /// Whether the secure element / keystore can be reached right now.
    fn is_available(&self) -> bool;

    /// Whether keys in this store are protected by hardware.
    fn is_hardware_backed(&self) -> bool;

    /// Load the key stored under `alias`, or `None` if there is none yet.
    fn load_key(&self, alias: &str) -> Result<Option<KeyMaterial>, VaultError>;

    /// Persist `key` under `alias`, replacing any previous key.
    fn store_key(&self, alias: &str, key: &KeyMaterial) -> Result<(), VaultError>;

    /// Remove the key under `alias`. Removing a missing key is not an error.
    fn delete_key(&self, alias: &str) -> Result<(), VaultError>;

    /// Human-readable backend description for diagnostics.
    fn description(&self) -> String;
}
