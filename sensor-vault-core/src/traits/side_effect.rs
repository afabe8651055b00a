use crate::models::receipt::CaptureReceipt;
use crate::traits::record::Record;

/// Best-effort follow-up run after a capture is persisted, such as queueing
/// for backup or notifying sharing peers.
///
/// Errors are logged by the orchestrator and never fail the capture.
pub trait SideEffectHook: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    fn on_captured(&self, receipt: &CaptureReceipt, record: &dyn Record) -> Result<(), String>;
}
