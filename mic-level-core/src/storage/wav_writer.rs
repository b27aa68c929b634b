use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::format::WaveFormat;
use crate::processing::wav_format::{self, MAX_WAV_DATA_SIZE, WAV_HEADER_SIZE};

/// `output_<YYYY-MM-DD_HH-MM-SS>.wav` for the given capture time.
pub fn recording_file_name(captured_at: DateTime<Local>) -> String {
    format!("output_{}.wav", captured_at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Path for a new recording in `directory` that does not clobber an
/// existing file from the same second.
pub fn unique_recording_path(directory: &Path, captured_at: DateTime<Local>) -> PathBuf {
    let base = directory.join(recording_file_name(captured_at));
    if !base.exists() {
        return base;
    }
    let stem = format!("output_{}", captured_at.format("%Y-%m-%d_%H-%M-%S"));
    (1..)
        .map(|n| directory.join(format!("{}_{}.wav", stem, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// Streaming PCM WAV writer.
///
/// ```text
/// [44-byte WAV header]
/// [raw interleaved 16-bit PCM data...]
/// ```
///
/// The header is written with a zero data size on `open` and patched on
/// `close`, so the finished file is bit-exact with one written in one go.
pub struct WavFileWriter {
    file_path: PathBuf,
    format: WaveFormat,
    file: Option<File>,
    data_bytes: u64,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf, format: WaveFormat) -> Self {
        Self {
            file_path,
            format,
            file: None,
            data_bytes: 0,
        }
    }

    /// Create the file (and its directory) and write the header.
    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::FileWriteFailure(format!("failed to create directory: {}", e))
            })?;
        }

        let mut file = File::create(&self.file_path).map_err(|e| {
            CaptureError::FileWriteFailure(format!(
                "failed to create {}: {}",
                self.file_path.display(),
                e
            ))
        })?;

        let header = wav_format::generate_wav_header(&self.format, 0)?;
        file.write_all(&header)
            .map_err(|e| CaptureError::FileWriteFailure(format!("header write failed: {}", e)))?;

        self.file = Some(file);
        self.data_bytes = 0;
        Ok(())
    }

    /// Append raw PCM bytes.
    pub fn write(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::FileWriteFailure("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::FileWriteFailure(format!("write failed: {}", e)))?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Patch the header sizes, flush, and return the SHA-256 of the file.
    pub fn close(&mut self) -> Result<String, CaptureError> {
        self.finish()?;
        sha256_file(&self.file_path)
    }

    /// Patch the header sizes and flush the file to disk.
    fn finish(&mut self) -> Result<(), CaptureError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| CaptureError::FileWriteFailure("file is not open".into()))?;

        let data_size = u32::try_from(self.data_bytes)
            .ok()
            .filter(|&size| size <= MAX_WAV_DATA_SIZE)
            .ok_or_else(|| {
                CaptureError::FileWriteFailure(format!(
                    "{} bytes exceed WAV limit",
                    self.data_bytes
                ))
            })?;

        let mut sizes = [0u8; WAV_HEADER_SIZE];
        wav_format::patch_riff_size(&mut sizes, data_size)?;
        wav_format::patch_data_size(&mut sizes, data_size);

        let io = |e: std::io::Error| CaptureError::FileWriteFailure(e.to_string());
        file.seek(SeekFrom::Start(4)).map_err(io)?;
        file.write_all(&sizes[4..8]).map_err(io)?;
        file.seek(SeekFrom::Start(40)).map_err(io)?;
        file.write_all(&sizes[40..44]).map_err(io)?;
        file.flush().map_err(io)?;
        file.sync_all().map_err(io)?;
        Ok(())
    }

    /// Data bytes written so far, excluding the header.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Write a complete WAV file in one call. Returns its SHA-256 checksum.
///
/// A partially written file is removed on failure. Once the file is complete
/// it is kept even if reading it back for the checksum fails.
pub fn write_wav(path: &Path, format: &WaveFormat, data: &[u8]) -> Result<String, CaptureError> {
    let mut writer = WavFileWriter::new(path.to_path_buf(), *format);
    let written = writer
        .open()
        .and_then(|_| writer.write(data))
        .and_then(|_| writer.finish());
    if let Err(e) = written {
        fs::remove_file(path).ok();
        return Err(e);
    }
    sha256_file(path)
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path).map_err(|e| {
        CaptureError::FileWriteFailure(format!("failed to read file for checksum: {}", e))
    })?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
