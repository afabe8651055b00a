use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::crypto::encryption_service::EncryptionService;
use crate::models::config::{validate_kind, VaultConfiguration};
use crate::models::envelope::{CloudStatus, DeletedEntry, EncryptedEnvelope, RecordListing, StoredRecord};
use crate::models::error::{CaptureError, VaultError};
use crate::models::receipt::{CaptureFeedback, CaptureReceipt, StorageRoute};
use crate::models::state::CaptureStage;
use crate::storage::record_store::RecordStore;
use crate::storage::secure_fs;
use crate::storage::structured::SessionRow;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::capture_session::CaptureService;
use crate::traits::key_store::KeyStore;
use crate::traits::record::Record;
use crate::traits::side_effect::SideEffectHook;

/// Single entry point of the capture pipeline.
///
/// Drives one record through file encryption, metadata encryption,
/// persistence and side-effect hooks:
/// ```text
/// Record → [EncryptionService: file] → [EncryptionService: metadata] → [RecordStore] → hooks
///                                                                            │
///                                     store unavailable → legacy plaintext log (degraded)
/// ```
/// Each capture runs synchronously on the caller's thread. Captures of
/// different records may run concurrently from several threads.
pub struct CaptureOrchestrator {
    encryption: Arc<EncryptionService>,
    store: RecordStore,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    hooks: Vec<Arc<dyn SideEffectHook>>,
    active_session: Mutex<Option<String>>,
}

impl CaptureOrchestrator {
    /// Validate `config` and provision the vault key from `key_store`.
    ///
    /// Fails with [`VaultError::KeyProvisioning`] when no hardware-backed key
    /// is available; the vault cannot run without one.
    pub fn open(config: VaultConfiguration, key_store: &dyn KeyStore) -> Result<Self, VaultError> {
        config.validate().map_err(VaultError::InvalidInput)?;
        let encryption = EncryptionService::open(key_store, &config.key_alias)?;
        Ok(Self::with_encryption(config, Arc::new(encryption)))
    }

    pub fn with_encryption(config: VaultConfiguration, encryption: Arc<EncryptionService>) -> Self {
        log::debug!("capture orchestrator using {}", config.data_directory.display());
        Self {
            encryption,
            store: RecordStore::new(config),
            delegate: None,
            hooks: Vec::new(),
            active_session: Mutex::new(None),
        }
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn add_hook(&mut self, hook: Arc<dyn SideEffectHook>) {
        self.hooks.push(hook);
    }

    pub fn config(&self) -> &VaultConfiguration {
        self.store.config()
    }

    pub fn encryption(&self) -> &EncryptionService {
        &self.encryption
    }

    // --- Capture ---

    /// Encrypt and persist `record`.
    ///
    /// On success the receipt names the record id and the route taken; a
    /// [`StorageRoute::LegacyFallback`] route means the metadata was stored
    /// unencrypted. Every call ends with exactly one delegate feedback.
    pub fn capture(&self, record: &dyn Record) -> Result<CaptureReceipt, CaptureError> {
        let result = self.run_capture(record);

        match &result {
            Ok(receipt) => {
                if receipt.is_degraded() {
                    log::warn!("{} {} stored without encryption", record.kind(), record.id());
                } else {
                    log::info!("captured {} {}", record.kind(), record.id());
                }
                self.notify(record.id(), &CaptureStage::Succeeded(Box::new(receipt.clone())));
                self.feedback(CaptureFeedback::succeeded(
                    record.id(),
                    record.display_name(),
                    receipt.is_degraded(),
                ));
            }
            Err(e) => {
                log::error!("capture of {} {} failed: {}", record.kind(), record.id(), e);
                if let Some(orphan) = e.orphaned_file() {
                    log::warn!("encrypted file {} has no stored record", orphan.display());
                }
                self.notify(record.id(), &CaptureStage::Failed(e.clone()));
                self.feedback(CaptureFeedback::failed(
                    record.id(),
                    record.display_name(),
                    e.category(),
                    &e.reason(),
                ));
            }
        }

        result
    }

    fn run_capture(&self, record: &dyn Record) -> Result<CaptureReceipt, CaptureError> {
        let id = record.id();
        self.notify(id, &CaptureStage::Received);
        let source_file = self.validate(record)?;

        // The encrypted file replaces the original; it is not rolled back if
        // a later step fails.
        let mut file_path = None;
        let mut file_checksum = None;
        if let Some(source) = source_file {
            self.notify(id, &CaptureStage::FileEncrypting);
            let encrypted = self
                .encryption
                .encrypt_file(&source)
                .map_err(CaptureError::FileEncryption)?;
            file_checksum = match secure_fs::sha256_file(&encrypted) {
                Ok(checksum) => Some(checksum),
                Err(e) => {
                    log::warn!("checksum of {} failed: {}", encrypted.display(), e);
                    None
                }
            };
            file_path = Some(encrypted);
        }

        self.notify(id, &CaptureStage::MetadataEncrypting);
        let envelope = self
            .encryption
            .seal_record(record)
            .map_err(|source| CaptureError::MetadataEncryption {
                source,
                orphaned_file: file_path.clone(),
            })?;

        self.notify(id, &CaptureStage::Persisting);
        let route = self
            .persist(record, &envelope, file_path.as_deref())
            .map_err(|source| CaptureError::Persistence {
                source,
                orphaned_file: file_path.clone(),
            })?;

        self.notify(id, &CaptureStage::QueuingSideEffects);
        let receipt = CaptureReceipt {
            id: id.to_string(),
            kind: record.kind().to_string(),
            route,
            file_path,
            file_checksum,
            session_id: self.link_to_active_session(id),
        };
        self.run_hooks(&receipt, record);

        Ok(receipt)
    }

    /// Returns the file to encrypt, if any.
    fn validate(&self, record: &dyn Record) -> Result<Option<PathBuf>, CaptureError> {
        validate_kind(record.kind()).map_err(|e| CaptureError::InvalidRecord(e.to_string()))?;
        if record.id().trim().is_empty() {
            return Err(CaptureError::InvalidRecord("record id must not be empty".into()));
        }
        if !record.geo_context().is_finite() {
            return Err(CaptureError::InvalidRecord(format!(
                "{} has non-finite coordinates",
                record.id()
            )));
        }
        record.validate_fields().map_err(CaptureError::InvalidRecord)?;

        let path = record.file_path().filter(|p| !p.as_os_str().is_empty());
        match path {
            Some(path) if path.is_file() => Ok(Some(path.to_path_buf())),
            Some(path) if record.requires_file() => Err(CaptureError::InvalidRecord(format!(
                "file not found: {}",
                path.display()
            ))),
            None if record.requires_file() => Err(CaptureError::InvalidRecord(format!(
                "{} records require a file",
                record.kind()
            ))),
            Some(path) => {
                log::warn!("ignoring missing optional file {}", path.display());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn persist(
        &self,
        record: &dyn Record,
        envelope: &EncryptedEnvelope,
        file_path: Option<&Path>,
    ) -> Result<StorageRoute, VaultError> {
        let primary = if self.store.is_structured(record.kind()) {
            self.store
                .persist_structured(envelope, file_path)
                .map(|_| StorageRoute::Structured)
        } else {
            self.store
                .persist_generic(envelope, file_path)
                .map(|_| StorageRoute::Generic)
        };

        match primary {
            Err(e) if e.is_fallback_eligible() && self.config().allow_legacy_fallback => {
                log::warn!(
                    "primary store unavailable for {} {} ({}); retrying through legacy log",
                    record.kind(),
                    record.id(),
                    e
                );
                self.store.persist_legacy(record, file_path)?;
                Ok(StorageRoute::LegacyFallback)
            }
            other => other,
        }
    }

    fn link_to_active_session(&self, item_id: &str) -> Option<String> {
        let session_id = self.active_session.lock().clone()?;
        match self.store.link_session_item(&session_id, item_id) {
            Ok(()) => Some(session_id),
            Err(e) => {
                log::warn!("failed to link {} to session {}: {}", item_id, session_id, e);
                None
            }
        }
    }

    fn run_hooks(&self, receipt: &CaptureReceipt, record: &dyn Record) {
        for hook in &self.hooks {
            match hook.on_captured(receipt, record) {
                Ok(()) => log::debug!("hook {} ran for {}", hook.name(), receipt.id),
                Err(e) => log::warn!("hook {} failed for {}: {}", hook.name(), receipt.id, e),
            }
        }
    }

    fn notify(&self, record_id: &str, stage: &CaptureStage) {
        log::debug!("capture {} → {}", record_id, stage.name());
        if let Some(delegate) = &self.delegate {
            delegate.on_stage_changed(record_id, stage);
        }
    }

    fn feedback(&self, feedback: CaptureFeedback) {
        if let Some(delegate) = &self.delegate {
            delegate.on_feedback(&feedback);
        }
    }

    // --- Read ---

    /// Decrypted records of `kind`, newest first.
    pub fn list_by_type(&self, kind: &str) -> Result<RecordListing, VaultError> {
        let scan = self.store.read_by_type(kind)?;
        let (records, undecryptable) = self.encryption.decrypt_entries(scan.entries);
        if scan.skipped > 0 || undecryptable > 0 {
            log::warn!(
                "{} listing: {} corrupt entries skipped, {} undecryptable",
                kind,
                scan.skipped,
                undecryptable
            );
        }
        Ok(RecordListing {
            records,
            skipped: scan.skipped,
            undecryptable,
        })
    }

    /// One decrypted record by id.
    pub fn get_record(&self, id: &str) -> Result<StoredRecord, VaultError> {
        let entry = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| VaultError::NotFound(format!("record {}", id)))?;
        self.encryption.decrypt_entry(entry)
    }

    /// Decrypt the file of record `id` to a scratch file. The caller must
    /// pass the result to [`release_playback_path`](Self::release_playback_path).
    pub fn get_playback_path(&self, id: &str) -> Result<PathBuf, VaultError> {
        let entry = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| VaultError::NotFound(format!("record {}", id)))?;
        let path = entry
            .file_path
            .ok_or_else(|| VaultError::NotFound(format!("record {} has no file", id)))?;
        self.encryption.decrypt_file_to_temp(&path)
    }

    pub fn release_playback_path(&self, temp_path: &Path) -> Result<(), VaultError> {
        self.encryption.cleanup_temp_file(temp_path).map(|_| ())
    }

    /// Like [`get_playback_path`](Self::get_playback_path), but the scratch
    /// file is removed when the guard is dropped.
    pub fn open_playback(&self, id: &str) -> Result<PlaybackGuard, VaultError> {
        let path = self.get_playback_path(id)?;
        Ok(PlaybackGuard {
            encryption: Arc::clone(&self.encryption),
            path: Some(path),
        })
    }

    // --- Management ---

    /// Remove the stored entry of `id` and securely delete its file.
    pub fn delete(&self, id: &str) -> Result<DeletedEntry, VaultError> {
        let entry = self
            .store
            .delete_entry(id)?
            .ok_or_else(|| VaultError::NotFound(format!("record {}", id)))?;

        let file_removed = match &entry.file_path {
            Some(path) => match secure_fs::secure_delete(path) {
                Ok(removed) => removed,
                Err(e) => {
                    log::warn!("entry {} deleted but file {} remains: {}", id, path.display(), e);
                    false
                }
            },
            None => false,
        };

        log::info!("deleted {} {}", entry.kind, id);
        Ok(DeletedEntry {
            id: entry.id,
            kind: entry.kind,
            source: entry.source,
            file_removed,
        })
    }

    pub fn update_cloud_status(&self, id: &str, status: CloudStatus) -> Result<(), VaultError> {
        if self.store.update_cloud_status(id, status)? {
            Ok(())
        } else {
            Err(VaultError::NotFound(format!("structured record {}", id)))
        }
    }

    /// Encrypted files in `directory` that no stored entry references.
    ///
    /// These are left behind when persistence fails after file encryption.
    /// Nothing is deleted; the caller decides.
    pub fn find_orphaned_files(&self, directory: &Path) -> Result<Vec<PathBuf>, VaultError> {
        let referenced: Vec<PathBuf> = self
            .store
            .referenced_files()?
            .into_iter()
            .map(|p| canonical(&p))
            .collect();

        let mut orphans = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if !path.is_file() || !EncryptionService::is_encrypted(&path) {
                continue;
            }
            if !referenced.contains(&canonical(&path)) {
                orphans.push(path);
            }
        }
        orphans.sort();
        Ok(orphans)
    }

    // --- Sessions ---

    /// Start a session; later captures are linked to it until it ends.
    pub fn begin_session(&self, name: &str) -> Result<String, VaultError> {
        let mut active = self.active_session.lock();
        if let Some(id) = active.as_ref() {
            return Err(VaultError::InvalidInput(format!("session {} is already active", id)));
        }
        let session = SessionRow {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            started_at: chrono::Utc::now().timestamp_millis(),
            ended_at: None,
        };
        self.store.create_session(&session)?;
        log::info!("session {} ({}) started", session.id, name);
        *active = Some(session.id.clone());
        Ok(session.id)
    }

    /// Make an existing, still open session the active one.
    pub fn resume_session(&self, session_id: &str) -> Result<(), VaultError> {
        let session = self
            .store
            .find_session(session_id)?
            .ok_or_else(|| VaultError::NotFound(format!("session {}", session_id)))?;
        if session.ended_at.is_some() {
            return Err(VaultError::InvalidInput(format!("session {} has ended", session_id)));
        }
        *self.active_session.lock() = Some(session.id);
        Ok(())
    }

    /// End the active session. Returns its id, or `None` if none was active.
    pub fn end_session(&self) -> Result<Option<String>, VaultError> {
        let mut active = self.active_session.lock();
        let Some(id) = active.clone() else {
            return Ok(None);
        };
        self.store.end_session(&id, chrono::Utc::now().timestamp_millis())?;
        *active = None;
        log::info!("session {} ended", id);
        Ok(Some(id))
    }

    pub fn active_session(&self) -> Option<String> {
        self.active_session.lock().clone()
    }

    pub fn session_items(&self, session_id: &str) -> Result<Vec<String>, VaultError> {
        self.store.session_items(session_id)
    }
}

impl CaptureService for CaptureOrchestrator {
    fn capture(&self, record: &dyn Record) -> Result<CaptureReceipt, CaptureError> {
        CaptureOrchestrator::capture(self, record)
    }

    fn list_by_type(&self, kind: &str) -> Result<RecordListing, VaultError> {
        CaptureOrchestrator::list_by_type(self, kind)
    }

    fn get_playback_path(&self, id: &str) -> Result<PathBuf, VaultError> {
        CaptureOrchestrator::get_playback_path(self, id)
    }

    fn release_playback_path(&self, temp_path: &Path) -> Result<(), VaultError> {
        CaptureOrchestrator::release_playback_path(self, temp_path)
    }

    fn delete(&self, id: &str) -> Result<DeletedEntry, VaultError> {
        CaptureOrchestrator::delete(self, id)
    }
}

/// Scratch file of a decrypted recording, securely deleted on drop.
pub struct PlaybackGuard {
    encryption: Arc<EncryptionService>,
    path: Option<PathBuf>,
}

impl PlaybackGuard {
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Delete the scratch file now and report failures.
    pub fn release(mut self) -> Result<(), VaultError> {
        match self.path.take() {
            Some(path) => self.encryption.cleanup_temp_file(&path).map(|_| ()),
            None => Ok(()),
        }
    }
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = self.encryption.cleanup_temp_file(&path) {
                log::warn!("failed to clean up {}: {}", path.display(), e);
            }
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
