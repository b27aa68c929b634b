use crate::models::state::{AutoRecordState, RecordCommand};

/// Next state and side effect for one incoming level sample.
///
/// `Idle` and level above `threshold` arms and starts; `Armed` and level at
/// or below `threshold` disarms and stops. Every other pair is a no-op.
/// There is no hysteresis band: a single sample at exactly the threshold
/// ends a recording.
pub fn transition(
    state: AutoRecordState,
    level: f64,
    threshold: f64,
) -> (AutoRecordState, Option<RecordCommand>) {
    match state {
        AutoRecordState::Idle if level > threshold => {
            (AutoRecordState::Armed, Some(RecordCommand::Start))
        }
        AutoRecordState::Armed if level <= threshold => {
            (AutoRecordState::Idle, Some(RecordCommand::Stop))
        }
        unchanged => (unchanged, None),
    }
}

/// Watches level samples and decides when recording starts and stops.
///
/// Runs inside the device callback, so it only decides; the caller forwards
/// the returned command to whoever drives the recorder.
#[derive(Debug, Clone)]
pub struct AutoRecordController {
    state: AutoRecordState,
    threshold: f64,
}

impl AutoRecordController {
    pub fn new(threshold: f64) -> Self {
        Self {
            state: AutoRecordState::Idle,
            threshold,
        }
    }

    pub fn on_level(&mut self, level: f64) -> Option<RecordCommand> {
        let (next, command) = transition(self.state, level, self.threshold);
        if next != self.state {
            log::debug!("Auto-record {:?} -> {:?} at level {:.1}", self.state, next, level);
        }
        self.state = next;
        command
    }

    pub fn state(&self) -> AutoRecordState {
        self.state
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.state = AutoRecordState::Idle;
    }
}
