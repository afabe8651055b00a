//! Routing facade over the structured store and the two generic logs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::generic_log::{GenericLog, LogLine};
use super::structured::{SessionRow, StructuredStore};
use super::EntryScan;
use crate::models::config::{validate_kind, VaultConfiguration};
use crate::models::envelope::{CloudStatus, EncryptedEnvelope, StoredEntry};
use crate::models::error::VaultError;
use crate::traits::record::Record;

pub struct RecordStore {
    config: VaultConfiguration,
    structured: StructuredStore,
    encrypted_log: GenericLog,
    legacy_log: GenericLog,
}

impl RecordStore {
    pub fn new(config: VaultConfiguration) -> Self {
        Self {
            structured: StructuredStore::new(config.database_path()),
            encrypted_log: GenericLog::encrypted(&config),
            legacy_log: GenericLog::legacy(&config),
            config,
        }
    }

    pub fn config(&self) -> &VaultConfiguration {
        &self.config
    }

    pub fn is_structured(&self, kind: &str) -> bool {
        self.config.is_structured(kind)
    }

    /// Insert a `data_items` row for a structured kind.
    pub fn persist_structured(
        &self,
        envelope: &EncryptedEnvelope,
        file_path: Option<&Path>,
    ) -> Result<String, VaultError> {
        if !self.is_structured(&envelope.kind) {
            return Err(VaultError::InvalidInput(format!(
                "{} has no structured table",
                envelope.kind
            )));
        }
        self.structured.insert(envelope, file_path)?;
        Ok(envelope.id.clone())
    }

    /// Append an encrypted line to the per-kind log.
    pub fn persist_generic(&self, envelope: &EncryptedEnvelope, file_path: Option<&Path>) -> Result<String, VaultError> {
        self.encrypted_log.append(&LogLine::sealed(envelope, file_path)?)?;
        Ok(envelope.id.clone())
    }

    /// Append a plaintext line to the legacy log. Only the capture fallback
    /// writes here.
    pub fn persist_legacy(&self, record: &dyn Record, file_path: Option<&Path>) -> Result<String, VaultError> {
        self.legacy_log.append(&LogLine::plaintext(record, file_path))?;
        Ok(record.id().to_string())
    }

    /// All stored entries of `kind`, newest first; ties keep insertion order.
    ///
    /// Reads the primary source for the kind (the table or the encrypted
    /// log) and then the legacy log, and merges both. Missing sources read
    /// as empty. If the table is unavailable the legacy entries are still
    /// returned.
    pub fn read_by_type(&self, kind: &str) -> Result<EntryScan, VaultError> {
        validate_kind(kind)?;

        let mut scan = if self.is_structured(kind) {
            match self.structured.list_by_type(kind) {
                Ok(scan) => scan,
                Err(e) if e.is_fallback_eligible() => {
                    log::warn!("structured store unavailable, reading legacy {} log only: {}", kind, e);
                    EntryScan::default()
                }
                Err(e) => return Err(e),
            }
        } else {
            self.encrypted_log.read(kind)?
        };
        scan.merge(self.legacy_log.read(kind)?);

        scan.entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(scan)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<StoredEntry>, VaultError> {
        if let Some(entry) = tolerate_unavailable(self.structured.find_by_id(id))? {
            return Ok(Some(entry));
        }
        if let Some(entry) = self.encrypted_log.find(id)? {
            return Ok(Some(entry));
        }
        self.legacy_log.find(id)
    }

    /// Remove the entry of `id` from whichever source holds it.
    pub fn delete_entry(&self, id: &str) -> Result<Option<StoredEntry>, VaultError> {
        if let Some(entry) = tolerate_unavailable(self.structured.delete(id))? {
            return Ok(Some(entry));
        }
        let removed = match self.encrypted_log.remove(id)? {
            Some(entry) => Some(entry),
            None => self.legacy_log.remove(id)?,
        };
        if removed.is_some() {
            if let Err(e) = self.structured.unlink_item(id) {
                log::warn!("failed to unlink {} from sessions: {}", id, e);
            }
        }
        Ok(removed)
    }

    pub fn update_cloud_status(&self, id: &str, status: CloudStatus) -> Result<bool, VaultError> {
        self.structured.update_cloud_status(id, status)
    }

    /// Every file path referenced by a stored entry.
    pub fn referenced_files(&self) -> Result<HashSet<PathBuf>, VaultError> {
        let mut paths: HashSet<PathBuf> = self.structured.file_paths()?.into_iter().collect();
        paths.extend(self.encrypted_log.file_paths()?);
        paths.extend(self.legacy_log.file_paths()?);
        Ok(paths)
    }

    pub fn create_session(&self, session: &SessionRow) -> Result<(), VaultError> {
        self.structured.create_session(session)
    }

    pub fn end_session(&self, session_id: &str, ended_at: i64) -> Result<bool, VaultError> {
        self.structured.end_session(session_id, ended_at)
    }

    pub fn find_session(&self, session_id: &str) -> Result<Option<SessionRow>, VaultError> {
        self.structured.find_session(session_id)
    }

    pub fn link_session_item(&self, session_id: &str, item_id: &str) -> Result<(), VaultError> {
        self.structured.link_item(session_id, item_id)
    }

    pub fn session_items(&self, session_id: &str) -> Result<Vec<String>, VaultError> {
        self.structured.session_items(session_id)
    }
}

/// Lookups by id also cover the logs, so an unavailable table only hides
/// structured rows.
fn tolerate_unavailable(result: Result<Option<StoredEntry>, VaultError>) -> Result<Option<StoredEntry>, VaultError> {
    match result {
        Err(e) if e.is_fallback_eligible() => {
            log::warn!("structured store unavailable, searching logs only: {}", e);
            Ok(None)
        }
        other => other,
    }
}
