use std::path::{Path, PathBuf};

use crate::models::envelope::{DeletedEntry, RecordListing};
use crate::models::error::{CaptureError, VaultError};
use crate::models::receipt::CaptureReceipt;
use crate::traits::record::Record;

/// Inbound interface used by presentation collaborators.
///
/// Implemented by [`CaptureOrchestrator`](crate::session::orchestrator::CaptureOrchestrator).
pub trait CaptureService: Send + Sync {
    /// Encrypt and persist `record`. Returns the record's id on success.
    fn capture(&self, record: &dyn Record) -> Result<CaptureReceipt, CaptureError>;

    /// Decrypted records of one kind, newest first. Unknown kinds yield an
    /// empty listing.
    fn list_by_type(&self, kind: &str) -> Result<RecordListing, VaultError>;

    /// Decrypt the file of record `id` to a scratch path for playback or
    /// export. The caller owns the scratch file and must release it on every
    /// exit path.
    fn get_playback_path(&self, id: &str) -> Result<PathBuf, VaultError>;

    /// Securely delete a scratch file returned by `get_playback_path`.
    fn release_playback_path(&self, temp_path: &Path) -> Result<(), VaultError>;

    /// Remove the stored row or log entry of `id` and its associated file.
    fn delete(&self, id: &str) -> Result<DeletedEntry, VaultError>;
}
