/// Auto-record state machine.
///
/// ```text
/// Idle ──level > T──▶ Armed
///  ▲                    │
///  └────level <= T──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoRecordState {
    #[default]
    Idle,
    Armed,
}

impl AutoRecordState {
    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed)
    }
}

/// Request issued to the recorder on a threshold crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordCommand {
    Start,
    Stop,
}
