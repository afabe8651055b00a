use super::error::CaptureError;
use super::receipt::CaptureReceipt;

/// Per-capture state machine.
///
/// State transitions:
/// ```text
/// received → file_encrypting → metadata_encrypting → persisting → queuing_side_effects → succeeded
///     ↓             ↓                  ↓                  ↓
///   failed        failed             failed             failed
/// ```
/// `file_encrypting` is skipped for records without a file.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStage {
    Received,
    FileEncrypting,
    MetadataEncrypting,
    Persisting,
    QueuingSideEffects,
    Succeeded(Box<CaptureReceipt>),
    Failed(CaptureError),
}

impl CaptureStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::FileEncrypting => "file_encrypting",
            Self::MetadataEncrypting => "metadata_encrypting",
            Self::Persisting => "persisting",
            Self::QueuingSideEffects => "queuing_side_effects",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!CaptureStage::Persisting.is_terminal());
        assert!(CaptureStage::Failed(CaptureError::InvalidRecord("x".into())).is_terminal());
        assert_eq!(CaptureStage::QueuingSideEffects.name(), "queuing_side_effects");
    }
}
