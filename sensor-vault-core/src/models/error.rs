use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by individual pipeline operations.
///
/// Payloads are plain strings so the error can be cloned into stage
/// values and delegate callbacks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("key provisioning failed: {0}")]
    KeyProvisioning(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("authentication failed: ciphertext was tampered with or sealed under another key")]
    Authentication,

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl VaultError {
    /// Whether the capture orchestrator may retry through the legacy
    /// plaintext log after this error.
    ///
    /// I/O and constraint faults are not retried: the legacy log lives on
    /// the same disk and a constraint violation would only be repeated.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DiskFull
                | ErrorCode::ConstraintViolation
                | ErrorCode::SystemIoFailure
                | ErrorCode::ReadOnly
                | ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::TooBig => Self::Persistence(err.to_string()),
                _ => Self::StoreUnavailable(err.to_string()),
            },
            _ => Self::StoreUnavailable(err.to_string()),
        }
    }
}

/// Terminal failure of a single capture call.
///
/// Wraps the first [`VaultError`] that stopped the capture. Failures that
/// happen after the associated file was already encrypted carry the path
/// of that file: the encryption is not rolled back, so the file exists on
/// disk without a stored record until a reconciliation sweep picks it up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("file encryption failed: {0}")]
    FileEncryption(VaultError),

    #[error("metadata encryption failed: {source}")]
    MetadataEncryption {
        source: VaultError,
        orphaned_file: Option<PathBuf>,
    },

    #[error("persistence failed: {source}")]
    Persistence {
        source: VaultError,
        orphaned_file: Option<PathBuf>,
    },
}

impl CaptureError {
    /// Short, stable label used in user-facing failure messages.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRecord(_) => "invalid_record",
            Self::FileEncryption(_) => "encryption",
            Self::MetadataEncryption { .. } => "encryption",
            Self::Persistence { .. } => "persistence",
        }
    }

    /// Encrypted file left on disk without stored metadata, if any.
    pub fn orphaned_file(&self) -> Option<&Path> {
        match self {
            Self::MetadataEncryption { orphaned_file, .. } | Self::Persistence { orphaned_file, .. } => {
                orphaned_file.as_deref()
            }
            _ => None,
        }
    }

    /// Failure detail without the stage prefix, for messages that already
    /// name the category.
    pub fn reason(&self) -> String {
        match self {
            Self::InvalidRecord(reason) => reason.clone(),
            Self::FileEncryption(source)
            | Self::MetadataEncryption { source, .. }
            | Self::Persistence { source, .. } => source.to_string(),
        }
    }

    /// The underlying operation error, when there is one.
    pub fn vault_error(&self) -> Option<&VaultError> {
        match self {
            Self::InvalidRecord(_) => None,
            Self::FileEncryption(source) => Some(source),
            Self::MetadataEncryption { source, .. } | Self::Persistence { source, .. } => Some(source),
        }
    }
}
