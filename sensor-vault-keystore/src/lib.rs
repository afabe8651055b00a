//! # sensor-vault-keystore
//!
//! Platform key store backends for sensor-vault.
//!
//! Provides:
//! - `KeychainKeyStore`: macOS Keychain via Security.framework
//! - `UnsupportedKeyStore`: every other platform; reports the secure store
//!   as unavailable, so opening a vault fails with a key provisioning error
//!
//! ## Usage
//! ```ignore
//! use sensor_vault_core::{CaptureOrchestrator, VaultConfiguration};
//!
//! let store = sensor_vault_keystore::platform_key_store();
//! let vault = CaptureOrchestrator::open(VaultConfiguration::new("/data"), store.as_ref())?;
//! ```

#[cfg(target_os = "macos")]
pub mod keychain;
#[cfg(not(target_os = "macos"))]
pub mod unsupported;

#[cfg(target_os = "macos")]
pub use keychain::KeychainKeyStore;
#[cfg(not(target_os = "macos"))]
pub use unsupported::UnsupportedKeyStore;

use sensor_vault_core::{KeyMaterial, KeyStore, VaultError};
use zeroize::Zeroizing;

/// Keychain service name under which vault keys are stored.
pub const SERVICE_NAME: &str = "sensor-vault";

/// The key store for the current platform.
pub fn platform_key_store() -> Box<dyn KeyStore> {
    #[cfg(target_os = "macos")]
    {
        Box::new(KeychainKeyStore::new(SERVICE_NAME))
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(UnsupportedKeyStore::new())
    }
}

/// Keys are stored hex-encoded.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn encode_key(key: &KeyMaterial) -> Zeroizing<String> {
    Zeroizing::new(hex::encode(key.expose_bytes()))
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn decode_key(data: &[u8]) -> Result<KeyMaterial, VaultError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| VaultError::KeyProvisioning(format!("stored key is not valid UTF-8: {}", e)))?;
    let bytes = Zeroizing::new(
        hex::decode(text.trim())
            .map_err(|e| VaultError::KeyProvisioning(format!("stored key is not valid hex: {}", e)))?,
    );
    KeyMaterial::from_slice(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_codec_round_trips() {
        let key = KeyMaterial::generate();
        let encoded = encode_key(&key);
        assert_eq!(encoded.len(), 64);
        assert_eq!(decode_key(encoded.as_bytes()).unwrap(), key);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(decode_key(b"not-hex!"), Err(VaultError::KeyProvisioning(_))));
        let short = hex::encode([7u8; 16]);
        assert!(matches!(decode_key(short.as_bytes()), Err(VaultError::KeyProvisioning(_))));
        assert!(decode_key(&[0xff, 0xfe]).is_err());
    }

    #[test]
    fn platform_store_describes_itself() {
        assert!(!platform_key_store().description().is_empty());
    }
}
