use sensor_vault_core::{CaptureDelegate, CaptureFeedback, CaptureStage};

/// CaptureDelegate that prints capture feedback to the terminal.
pub struct ConsoleDelegate;

impl CaptureDelegate for ConsoleDelegate {
    fn on_stage_changed(&self, record_id: &str, stage: &CaptureStage) {
        log::debug!("{}: {}", record_id, stage.name());
    }

    fn on_feedback(&self, feedback: &CaptureFeedback) {
        if feedback.success {
            println!("{} [{}]", feedback.message, feedback.record_id);
        } else {
            eprintln!("{} [{}]", feedback.message, feedback.record_id);
        }
    }
}
