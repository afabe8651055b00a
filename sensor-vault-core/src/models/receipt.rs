use std::path::PathBuf;

/// Which store accepted a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageRoute {
    /// `data_items` table.
    Structured,
    /// Per-kind encrypted log.
    Generic,
    /// Unencrypted legacy log, used only after the primary store was unavailable.
    LegacyFallback,
}

/// Result returned when a capture completes successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReceipt {
    pub id: String,
    pub kind: String,
    pub route: StorageRoute,
    /// Path of the stored file (the encrypted one for file-bearing kinds).
    pub file_path: Option<PathBuf>,
    /// SHA-256 hex digest of the stored file.
    pub file_checksum: Option<String>,
    /// Session the capture was linked to, if one was active.
    pub session_id: Option<String>,
}

impl CaptureReceipt {
    /// True when the metadata was written in plaintext through the legacy
    /// fallback. Callers must surface this; the capture is persisted but not
    /// confidential.
    pub fn is_degraded(&self) -> bool {
        self.route == StorageRoute::LegacyFallback
    }
}

/// Success/failure signal emitted for UI feedback (toasts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFeedback {
    pub success: bool,
    pub record_id: String,
    pub message: String,
}

impl CaptureFeedback {
    pub fn succeeded(record_id: &str, display_name: &str, degraded: bool) -> Self {
        let message = if degraded {
            format!("{} saved without encryption", display_name)
        } else {
            format!("{} saved successfully", display_name)
        };
        Self {
            success: true,
            record_id: record_id.to_string(),
            message,
        }
    }

    pub fn failed(record_id: &str, display_name: &str, category: &str, reason: &str) -> Self {
        Self {
            success: false,
            record_id: record_id.to_string(),
            message: format!("Failed to save {} ({}): {}", display_name, category, reason),
        }
    }
}
