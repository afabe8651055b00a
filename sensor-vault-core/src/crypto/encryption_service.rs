//! File and metadata encryption on top of the byte-level [`PayloadCipher`].
//!
//! ## File states
//!
//! ```text
//! plaintext ──encrypt_file──▶ <name>.enc ──decrypt_file_to_temp──▶ <name>.temp ──cleanup_temp_file──▶ (gone)
//! ```
//!
//! Neither step overwrites an existing file: when `<name>.enc` or
//! `<name>.temp` is taken, a random tag is inserted before the marker
//! (`<name>.<tag>.enc`).
//!
//! The plaintext original is destroyed only after the encrypted copy has
//! been written, fsynced and read back. Scratch files are owned by the
//! caller and are never aged out automatically.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::Zeroizing;

use crate::crypto::key_manager::KeyManager;
use crate::models::envelope::{EncryptedEnvelope, EntryBody, StoredEntry, StoredRecord};
use crate::models::error::VaultError;
use crate::storage::secure_fs;
use crate::traits::encryptor::PayloadCipher;
use crate::traits::key_store::KeyStore;
use crate::traits::record::{Payload, Record};

/// Appended to files that are encrypted at rest.
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Marks temporary decrypted copies created for playback or export.
pub const TEMP_SUFFIX: &str = ".temp";

pub struct EncryptionService {
    cipher: Arc<dyn PayloadCipher>,
}

impl EncryptionService {
    pub fn new(cipher: Arc<dyn PayloadCipher>) -> Self {
        Self { cipher }
    }

    /// Build the service on a [`KeyManager`] provisioned from `store`.
    ///
    /// This is the single initialization point for key material; it fails
    /// with [`VaultError::KeyProvisioning`] when no hardware-backed key can
    /// be provisioned.
    pub fn open(store: &dyn KeyStore, key_alias: &str) -> Result<Self, VaultError> {
        let manager = KeyManager::new(store, key_alias)?;
        log::info!("encryption service initialized ({})", manager.algorithm());
        Ok(Self::new(Arc::new(manager)))
    }

    pub fn key_metadata(&self) -> HashMap<String, String> {
        self.cipher.key_metadata()
    }

    pub fn algorithm(&self) -> &str {
        self.cipher.algorithm()
    }

    // --- Files ---

    /// Encrypt `path` to `path + ".enc"` (or a tagged variant if that name is
    /// taken) and securely delete the original.
    ///
    /// Empty, missing or already-encrypted paths are returned unchanged.
    /// If encryption or the write fails, the partial encrypted file is
    /// removed and the original is left untouched. If the original cannot
    /// be removed afterwards, the encrypted copy is kept and an error is
    /// returned.
    pub fn encrypt_file(&self, path: &Path) -> Result<PathBuf, VaultError> {
        if path.as_os_str().is_empty() {
            return Ok(path.to_path_buf());
        }
        if Self::is_encrypted(path) {
            log::debug!("file already encrypted: {}", path.display());
            return Ok(path.to_path_buf());
        }
        if !path.exists() {
            log::warn!("file not found for encryption: {}", path.display());
            return Ok(path.to_path_buf());
        }

        let plaintext = Zeroizing::new(
            fs::read(path).map_err(|e| VaultError::Encryption(format!("failed to read {}: {}", path.display(), e)))?,
        );
        log::debug!("encrypting {} ({} bytes)", path.display(), plaintext.len());

        let sealed = self.cipher.encrypt(&plaintext).map_err(as_encryption_error)?;

        // An existing `.enc` file belongs to another record; it is never replaced.
        let (encrypted_path, mut file) = secure_fs::create_unique(path, ENCRYPTED_SUFFIX).map_err(|e| {
            VaultError::Encryption(format!("failed to create encrypted copy of {}: {}", path.display(), e))
        })?;
        if let Err(e) = write_verified(&encrypted_path, &mut file, &sealed) {
            drop(file);
            let _ = fs::remove_file(&encrypted_path);
            return Err(VaultError::Encryption(format!(
                "failed to write {}: {}",
                encrypted_path.display(),
                e
            )));
        }

        secure_fs::secure_delete(path).map_err(|e| {
            VaultError::Encryption(format!("failed to remove plaintext {}: {}", path.display(), e))
        })?;
        if path.exists() {
            return Err(VaultError::Encryption(format!(
                "plaintext {} still present after delete",
                path.display()
            )));
        }

        log::debug!("file encrypted: {} ({} bytes)", encrypted_path.display(), sealed.len());
        Ok(encrypted_path)
    }

    /// Decrypt an encrypted file into a `.temp` scratch file next to it.
    ///
    /// Paths without the `.enc` marker are returned unchanged. The caller
    /// must pass the result to [`cleanup_temp_file`](Self::cleanup_temp_file)
    /// on every exit path.
    pub fn decrypt_file_to_temp(&self, path: &Path) -> Result<PathBuf, VaultError> {
        if !Self::is_encrypted(path) {
            log::debug!("file is not encrypted: {}", path.display());
            return Ok(path.to_path_buf());
        }
        if !path.is_file() {
            return Err(VaultError::Decryption(format!(
                "encrypted file not found: {}",
                path.display()
            )));
        }

        let sealed = fs::read(path)
            .map_err(|e| VaultError::Decryption(format!("failed to read {}: {}", path.display(), e)))?;
        let plaintext = Zeroizing::new(self.cipher.decrypt(&sealed)?);

        // Each call gets its own scratch file, so one caller's cleanup never
        // removes another caller's copy.
        let (temp_path, mut file) = secure_fs::create_unique(&Self::temp_base_for(path), TEMP_SUFFIX)
            .map_err(|e| VaultError::Decryption(format!("failed to create scratch file for {}: {}", path.display(), e)))?;
        if let Err(e) = secure_fs::write_all_synced(&mut file, &plaintext) {
            drop(file);
            let _ = fs::remove_file(&temp_path);
            return Err(VaultError::Decryption(format!(
                "failed to write {}: {}",
                temp_path.display(),
                e
            )));
        }

        log::debug!("decrypted {} to scratch file", path.display());
        Ok(temp_path)
    }

    /// Securely delete a scratch file. Paths without the `.temp` marker are
    /// ignored. Returns whether a file was removed.
    pub fn cleanup_temp_file(&self, temp_path: &Path) -> Result<bool, VaultError> {
        if !Self::is_temp_file(temp_path) {
            log::debug!("refusing to clean up non-scratch path {}", temp_path.display());
            return Ok(false);
        }
        let removed = secure_fs::secure_delete(temp_path)?;
        if removed {
            log::debug!("cleaned up scratch file {}", temp_path.display());
        }
        Ok(removed)
    }

    /// True iff `path` ends with the encrypted marker. No I/O.
    pub fn is_encrypted(path: &Path) -> bool {
        secure_fs::has_suffix(path, ENCRYPTED_SUFFIX)
    }

    /// True iff `path` ends with the scratch marker. No I/O.
    pub fn is_temp_file(path: &Path) -> bool {
        secure_fs::has_suffix(path, TEMP_SUFFIX)
    }

    /// File name with the encrypted/scratch markers stripped, for display.
    pub fn display_file_name(path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        name.strip_suffix(ENCRYPTED_SUFFIX)
            .or_else(|| name.strip_suffix(TEMP_SUFFIX))
            .unwrap_or(&name)
            .to_string()
    }

    fn temp_base_for(encrypted_path: &Path) -> PathBuf {
        secure_fs::strip_suffix(encrypted_path, ENCRYPTED_SUFFIX).unwrap_or_else(|| encrypted_path.to_path_buf())
    }

    // --- Metadata ---

    /// Encrypt the record's payload into an envelope with cleartext
    /// `type`/`id`/`timestamp`/`display_name`.
    pub fn seal_record(&self, record: &dyn Record) -> Result<EncryptedEnvelope, VaultError> {
        let json = serde_json::to_string(&record.to_json())
            .map_err(|e| VaultError::Encryption(format!("failed to serialize payload: {}", e)))?;
        let sealed = self.cipher.encrypt(json.as_bytes()).map_err(as_encryption_error)?;

        log::debug!("encrypted {} metadata ({} bytes)", record.kind(), sealed.len());
        Ok(EncryptedEnvelope {
            kind: record.kind().to_string(),
            id: record.id().to_string(),
            timestamp: record.timestamp(),
            encrypted: true,
            ciphertext: Some(BASE64.encode(sealed)),
            display_name: record.display_name().to_string(),
        })
    }

    /// Envelope JSON for `record`.
    pub fn encrypt_record_metadata(&self, record: &dyn Record) -> Result<String, VaultError> {
        let envelope = self.seal_record(record)?;
        serde_json::to_string(&envelope)
            .map_err(|e| VaultError::Encryption(format!("failed to serialize envelope: {}", e)))
    }

    /// Original payload JSON of an envelope. Input without `encrypted: true`
    /// is legacy plaintext and is returned unchanged.
    pub fn decrypt_record_metadata(&self, envelope_json: &str) -> Result<String, VaultError> {
        let value: serde_json::Value = serde_json::from_str(envelope_json)?;
        let encrypted = value.get("encrypted").and_then(|v| v.as_bool()).unwrap_or(false);
        if !encrypted {
            return Ok(envelope_json.to_string());
        }
        let envelope: EncryptedEnvelope = serde_json::from_value(value)?;
        self.open_envelope(&envelope)
    }

    /// Decrypt the ciphertext carried by `envelope`.
    pub fn open_envelope(&self, envelope: &EncryptedEnvelope) -> Result<String, VaultError> {
        let ciphertext = envelope
            .ciphertext
            .as_deref()
            .ok_or_else(|| VaultError::Decryption(format!("envelope {} has no ciphertext", envelope.id)))?;
        self.open_ciphertext(ciphertext)
    }

    fn open_ciphertext(&self, ciphertext_b64: &str) -> Result<String, VaultError> {
        let sealed = BASE64
            .decode(ciphertext_b64.trim())
            .map_err(|e| VaultError::Decryption(format!("invalid base64 ciphertext: {}", e)))?;
        let bytes = self.cipher.decrypt(&sealed)?;
        String::from_utf8(bytes).map_err(|e| VaultError::Decryption(format!("payload is not UTF-8: {}", e)))
    }

    fn open_payload(&self, ciphertext_b64: &str) -> Result<Payload, VaultError> {
        let json = Zeroizing::new(self.open_ciphertext(ciphertext_b64)?);
        match serde_json::from_str(&json)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(VaultError::Parse("decrypted payload is not a JSON object".into())),
        }
    }

    /// Decrypt one stored entry.
    pub fn decrypt_entry(&self, entry: StoredEntry) -> Result<StoredRecord, VaultError> {
        let encrypted = entry.is_encrypted();
        let payload = match entry.body {
            EntryBody::Plain(payload) => payload,
            EntryBody::Sealed(ref ciphertext) => self.open_payload(ciphertext)?,
        };
        Ok(StoredRecord {
            id: entry.id,
            kind: entry.kind,
            timestamp: entry.timestamp,
            display_name: entry.display_name,
            file_path: entry.file_path,
            cloud_status: entry.cloud_status,
            source: entry.source,
            encrypted,
            payload,
        })
    }

    /// Decrypt a batch of stored entries, preserving order.
    ///
    /// Entries that fail to decode or authenticate are dropped, logged, and
    /// counted in the second tuple element; they are never returned as
    /// plaintext.
    pub fn decrypt_entries(&self, entries: Vec<StoredEntry>) -> (Vec<StoredRecord>, usize) {
        let mut records = Vec::with_capacity(entries.len());
        let mut undecryptable = 0;

        for entry in entries {
            let (kind, id) = (entry.kind.clone(), entry.id.clone());
            match self.decrypt_entry(entry) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::error!("cannot decrypt {} entry {}: {}", kind, id, e);
                    undecryptable += 1;
                }
            }
        }

        (records, undecryptable)
    }
}

/// Write, then read back and compare, so the original is only destroyed
/// once the encrypted copy is known to be on disk.
fn write_verified(path: &Path, file: &mut fs::File, data: &[u8]) -> std::io::Result<()> {
    secure_fs::write_all_synced(file, data)?;
    let written = fs::read(path)?;
    if written != data {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "read-back does not match written ciphertext",
        ));
    }
    Ok(())
}

fn as_encryption_error(err: VaultError) -> VaultError {
    match err {
        VaultError::Encryption(_) => err,
        other => VaultError::Encryption(other.to_string()),
    }
}
