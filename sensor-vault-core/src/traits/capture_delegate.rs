use crate::models::receipt::CaptureFeedback;
use crate::models::state::CaptureStage;

/// Event delegate for capture notifications.
///
/// All methods are called synchronously from the thread driving the
/// capture. Implementations should marshal to the UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called on every stage transition of a capture.
    fn on_stage_changed(&self, record_id: &str, stage: &CaptureStage);

    /// Called once per capture with a human-readable success/failure message.
    fn on_feedback(&self, feedback: &CaptureFeedback);
}
