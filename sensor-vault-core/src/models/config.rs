use std::path::PathBuf;

use super::error::VaultError;

/// Configuration for a vault instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfiguration {
    /// Root directory for the database and the generic logs (default: `.`).
    pub data_directory: PathBuf,

    /// File name of the structured store inside `data_directory`.
    pub database_file_name: String,

    /// Alias under which the symmetric key lives in the key store.
    pub key_alias: String,

    /// Kinds routed to the structured `data_items` table. Every other kind
    /// goes to its own generic log.
    pub structured_kinds: Vec<String>,

    /// Retry once through the unencrypted legacy log when the primary store
    /// is unavailable (default: true). Such captures are flagged as degraded.
    pub allow_legacy_fallback: bool,
}

impl VaultConfiguration {
    pub fn new(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database_file_name.trim().is_empty() {
            return Err("database file name must not be empty".into());
        }
        if self.key_alias.trim().is_empty() {
            return Err("key alias must not be empty".into());
        }
        for kind in &self.structured_kinds {
            validate_kind(kind).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    pub fn is_structured(&self, kind: &str) -> bool {
        self.structured_kinds.iter().any(|k| k == kind)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_directory.join(&self.database_file_name)
    }

    pub fn encrypted_log_directory(&self) -> PathBuf {
        self.data_directory.join("generic")
    }

    pub fn legacy_log_directory(&self) -> PathBuf {
        self.data_directory.join("legacy")
    }

    /// `<data>/generic/<kind>.jsonl`
    pub fn encrypted_log_path(&self, kind: &str) -> PathBuf {
        self.encrypted_log_directory().join(format!("{}.jsonl", kind))
    }

    /// `<data>/legacy/<kind>_data.txt`
    pub fn legacy_log_path(&self, kind: &str) -> PathBuf {
        self.legacy_log_directory().join(format!("{}_data.txt", kind))
    }
}

impl Default for VaultConfiguration {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("."),
            database_file_name: "sensor_vault.db".into(),
            key_alias: "SensorVaultEncryptionKey".into(),
            structured_kinds: vec!["location".into()],
            allow_legacy_fallback: true,
        }
    }
}

/// Kinds name log files, so they are restricted to lowercase ASCII
/// alphanumerics, `_` and `-`.
pub fn validate_kind(kind: &str) -> Result<(), VaultError> {
    if kind.is_empty() {
        return Err(VaultError::InvalidInput("record kind must not be empty".into()));
    }
    let valid = kind
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if !valid {
        return Err(VaultError::InvalidInput(format!("unsupported record kind: {:?}", kind)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routes_location_to_structured_store() {
        let config = VaultConfiguration::default();
        assert!(config.validate().is_ok());
        assert!(config.is_structured("location"));
        assert!(!config.is_structured("audio"));
    }

    #[test]
    fn derived_paths() {
        let config = VaultConfiguration::new("/data");
        assert_eq!(config.database_path(), PathBuf::from("/data/sensor_vault.db"));
        assert_eq!(config.encrypted_log_path("audio"), PathBuf::from("/data/generic/audio.jsonl"));
        assert_eq!(config.legacy_log_path("audio"), PathBuf::from("/data/legacy/audio_data.txt"));
    }

    #[test]
    fn rejects_bad_values() {
        let config = VaultConfiguration {
            database_file_name: " ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = VaultConfiguration {
            structured_kinds: vec!["../etc".into()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn kind_validation() {
        assert!(validate_kind("audio").is_ok());
        assert!(validate_kind("step_count-v2").is_ok());
        assert!(validate_kind("").is_err());
        assert!(validate_kind("Audio").is_err());
        assert!(validate_kind("a/b").is_err());
    }
}
