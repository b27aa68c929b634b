use std::fmt;

use thiserror::Error;

/// Device operation that failed, reported alongside the backend status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceOperation {
    Open,
    Prepare,
    AddBuffer,
    Start,
    Stop,
}

impl fmt::Display for DeviceOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Prepare => "prepare",
            Self::AddBuffer => "add buffer",
            Self::Start => "start",
            Self::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while monitoring or recording.
///
/// None of these are fatal to the process. Each is handled at the component
/// that detected it and surfaced through return values and the log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device unavailable ({operation}): {code}")]
    DeviceUnavailable {
        operation: DeviceOperation,
        code: String,
    },

    #[error("file write failed: {0}")]
    FileWriteFailure(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("thread spawn failed: {0}")]
    ThreadSpawn(String),

    /// A worker thread panicked before it could report a result.
    #[error("{0} thread panicked")]
    ThreadPanicked(String),
}

impl CaptureError {
    pub fn device(operation: DeviceOperation, code: impl fmt::Display) -> Self {
        Self::DeviceUnavailable {
            operation,
            code: code.to_string(),
        }
    }

    pub fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. })
    }
}
