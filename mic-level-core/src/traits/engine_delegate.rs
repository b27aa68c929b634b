use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingOutcome;

/// Event delegate for engine notifications.
///
/// Auto-record events arrive on the monitor supervisor thread. Manual
/// recordings started through `LevelEngine` report on the caller's thread.
/// Nothing is called from the device callback. Implementations should
/// marshal to a UI thread if needed.
pub trait EngineDelegate: Send + Sync {
    /// Monitoring started (`true`) or fully stopped (`false`).
    fn on_monitoring_changed(&self, running: bool);

    /// A recording session started.
    fn on_recording_started(&self);

    /// A recording session ended, with or without a file.
    fn on_recording_finished(&self, outcome: &RecordingOutcome);

    /// A non-fatal error occurred.
    fn on_error(&self, error: &CaptureError);
}
