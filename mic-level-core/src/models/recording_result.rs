use std::path::{Path, PathBuf};

use super::error::CaptureError;
use super::format::WaveFormat;

/// A recording that was written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub bytes_recorded: usize,
    pub duration_secs: f64,
    pub format: WaveFormat,
    /// SHA-256 hex digest of the complete file.
    pub checksum: String,
}

/// How a recording session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingOutcome {
    Saved(RecordingResult),
    /// The session stopped before any audio arrived; no file was produced.
    NoDataRecorded,
    Failed(CaptureError),
}

impl RecordingOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved(_))
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::Saved(result) => Some(&result.file_path),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}
