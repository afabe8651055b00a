//! Append-only per-kind logs of newline-delimited JSON.
//!
//! Two instances exist per vault: the encrypted log (`data` is a base64
//! ciphertext string) and the legacy log (`data` is the plaintext payload
//! object), which older builds wrote and the fallback path still writes.
//!
//! Appends to one kind are serialized through a per-kind lock so
//! concurrent writers never interleave partial lines.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode_body, secure_fs, EntryScan};
use crate::models::config::{validate_kind, VaultConfiguration};
use crate::models::envelope::{CloudStatus, EncryptedEnvelope, EntryBody, EntrySource, StoredEntry};
use crate::models::error::VaultError;
use crate::models::registry::default_display_name;
use crate::traits::record::Record;

/// One log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "filePath", default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub timestamp: i64,
    #[serde(default)]
    pub encrypted: bool,
    pub data: Value,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl LogLine {
    /// Line for an encrypted envelope.
    pub fn sealed(envelope: &EncryptedEnvelope, file_path: Option<&Path>) -> Result<Self, VaultError> {
        let ciphertext = envelope
            .ciphertext
            .clone()
            .ok_or_else(|| VaultError::InvalidInput(format!("envelope {} has no ciphertext", envelope.id)))?;
        Ok(Self {
            id: envelope.id.clone(),
            kind: envelope.kind.clone(),
            file_path: file_path.map(|p| p.to_string_lossy().to_string()),
            timestamp: envelope.timestamp,
            encrypted: true,
            data: Value::String(ciphertext),
            display_name: Some(envelope.display_name.clone()),
        })
    }

    /// Plaintext line carrying the record's payload.
    pub fn plaintext(record: &dyn Record, file_path: Option<&Path>) -> Self {
        Self {
            id: record.id().to_string(),
            kind: record.kind().to_string(),
            file_path: file_path.map(|p| p.to_string_lossy().to_string()),
            timestamp: record.timestamp(),
            encrypted: false,
            data: Value::Object(record.to_json()),
            display_name: Some(record.display_name().to_string()),
        }
    }

    fn into_entry(self, source: EntrySource) -> Result<StoredEntry, VaultError> {
        let (body, embedded_name) = decode_body(self.data)?;
        match (&body, self.encrypted) {
            (EntryBody::Sealed(_), false) => {
                return Err(VaultError::Parse(format!("line {} has ciphertext but encrypted=false", self.id)))
            }
            (EntryBody::Plain(_), true) => {
                return Err(VaultError::Parse(format!("line {} is marked encrypted but has plaintext", self.id)))
            }
            _ => {}
        }
        let display_name = self
            .display_name
            .filter(|n| !n.is_empty())
            .or(embedded_name)
            .unwrap_or_else(|| default_display_name(&self.kind));
        Ok(StoredEntry {
            id: self.id,
            kind: self.kind,
            timestamp: self.timestamp,
            display_name,
            file_path: self.file_path.filter(|p| !p.is_empty()).map(PathBuf::from),
            cloud_status: CloudStatus::Local,
            source,
            body,
        })
    }
}

pub struct GenericLog {
    directory: PathBuf,
    file_suffix: &'static str,
    source: EntrySource,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GenericLog {
    /// `<data>/generic/<kind>.jsonl`
    pub fn encrypted(config: &VaultConfiguration) -> Self {
        Self::new(config.encrypted_log_directory(), ".jsonl", EntrySource::GenericLog)
    }

    /// `<data>/legacy/<kind>_data.txt`
    pub fn legacy(config: &VaultConfiguration) -> Self {
        Self::new(config.legacy_log_directory(), "_data.txt", EntrySource::LegacyLog)
    }

    fn new(directory: PathBuf, file_suffix: &'static str, source: EntrySource) -> Self {
        Self {
            directory,
            file_suffix,
            source,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, kind: &str) -> PathBuf {
        self.directory.join(format!("{}{}", kind, self.file_suffix))
    }

    fn kind_lock(&self, kind: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(kind.to_string()).or_default())
    }

    fn ensure_directory(&self) -> Result<(), VaultError> {
        if self.directory.exists() && !self.directory.is_dir() {
            return Err(VaultError::StoreUnavailable(format!(
                "log location {} is not a directory",
                self.directory.display()
            )));
        }
        fs::create_dir_all(&self.directory)?;
        Ok(())
    }

    /// Append one line to the log of `line.kind` and sync it to disk.
    ///
    /// Fails with [`VaultError::Persistence`] when the log already holds
    /// an entry with the same id.
    pub fn append(&self, line: &LogLine) -> Result<(), VaultError> {
        validate_kind(&line.kind)?;
        self.ensure_directory()?;

        let mut bytes = serde_json::to_vec(line)
            .map_err(|e| VaultError::Persistence(format!("failed to serialize log line: {}", e)))?;
        bytes.push(b'\n');

        let path = self.path_for(&line.kind);
        let lock = self.kind_lock(&line.kind);
        let _guard = lock.lock();

        if holds_id(&path, &line.id)? {
            return Err(VaultError::Persistence(format!(
                "{} entry {} already exists in {}",
                line.kind,
                line.id,
                path.display()
            )));
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&bytes)?;
        file.sync_data()?;

        log::debug!("appended {} entry {} to {}", line.kind, line.id, path.display());
        Ok(())
    }

    /// Entries of `kind` in insertion order. A missing log is empty.
    ///
    /// Lines that fail to parse are skipped, logged and counted.
    pub fn read(&self, kind: &str) -> Result<EntryScan, VaultError> {
        validate_kind(kind)?;
        let path = self.path_for(kind);
        let bytes = {
            let lock = self.kind_lock(kind);
            let _guard = lock.lock();
            match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(EntryScan::default()),
                Err(e) => return Err(e.into()),
            }
        };

        let mut scan = EntryScan::default();
        for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            if raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match self.parse_line(raw) {
                Ok(entry) if entry.kind == kind => scan.entries.push(entry),
                Ok(entry) => {
                    log::debug!("ignoring {} entry {} in {} log", entry.kind, entry.id, kind);
                }
                Err(e) => {
                    log::warn!("skipping corrupt line {} in {}: {}", index + 1, path.display(), e);
                    scan.skipped += 1;
                }
            }
        }
        Ok(scan)
    }

    fn parse_line(&self, raw: &[u8]) -> Result<StoredEntry, VaultError> {
        let text = std::str::from_utf8(raw).map_err(|e| VaultError::Parse(e.to_string()))?;
        let line: LogLine = serde_json::from_str(text.trim())?;
        line.into_entry(self.source)
    }

    /// Kinds that have a log file.
    pub fn kinds(&self) -> Result<Vec<String>, VaultError> {
        let dir = match fs::read_dir(&self.directory) {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut kinds = Vec::new();
        for entry in dir {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(kind) = name.strip_suffix(self.file_suffix) {
                if validate_kind(kind).is_ok() {
                    kinds.push(kind.to_string());
                }
            }
        }
        kinds.sort();
        Ok(kinds)
    }

    pub fn find(&self, id: &str) -> Result<Option<StoredEntry>, VaultError> {
        for kind in self.kinds()? {
            if let Some(entry) = self.read(&kind)?.entries.into_iter().find(|e| e.id == id) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Rewrite the log holding `id` without that line. Corrupt lines are
    /// kept as they are.
    pub fn remove(&self, id: &str) -> Result<Option<StoredEntry>, VaultError> {
        for kind in self.kinds()? {
            let path = self.path_for(&kind);
            let lock = self.kind_lock(&kind);
            let _guard = lock.lock();

            let bytes = fs::read(&path)?;
            let mut removed = None;
            let mut kept = Vec::with_capacity(bytes.len());
            for raw in bytes.split(|b| *b == b'\n') {
                if raw.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                match self.parse_line(raw) {
                    Ok(entry) if removed.is_none() && entry.id == id => removed = Some(entry),
                    _ => {
                        kept.extend_from_slice(raw);
                        kept.push(b'\n');
                    }
                }
            }

            if removed.is_some() {
                let scratch = secure_fs::append_suffix(&path, ".rewrite");
                secure_fs::write_synced(&scratch, &kept)?;
                fs::rename(&scratch, &path)?;
                log::debug!("removed entry {} from {}", id, path.display());
                return Ok(removed);
            }
        }
        Ok(None)
    }

    /// File paths referenced by any readable line.
    pub fn file_paths(&self) -> Result<Vec<PathBuf>, VaultError> {
        let mut paths = Vec::new();
        for kind in self.kinds()? {
            paths.extend(self.read(&kind)?.entries.into_iter().filter_map(|e| e.file_path));
        }
        Ok(paths)
    }
}

#[derive(Deserialize)]
struct LineId {
    id: String,
}

/// Whether any parseable line of the log at `path` carries `id`.
fn holds_id(path: &Path, id: &str) -> Result<bool, VaultError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    Ok(bytes
        .split(|b| *b == b'\n')
        .filter_map(|raw| serde_json::from_slice::<LineId>(raw).ok())
        .any(|line| line.id == id))
}
