use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::CaptureError;
use super::format::WaveFormat;
use crate::processing::wav_format::MAX_WAV_DATA_SIZE;

/// Level above which auto-record starts, at or below which it stops.
pub const DEFAULT_THRESHOLD: f64 = 10.0;

/// Most level samples kept for consumers before the oldest is dropped.
pub const DEFAULT_LEVEL_QUEUE_CAPACITY: usize = 100;

/// Continuous low-latency capture feeding the level meter.
///
/// The format is independent of the recording format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfiguration {
    /// Capture format (default: 44100 Hz, mono, 16-bit).
    pub format: WaveFormat,

    /// Length of one capture buffer in milliseconds (default: 250).
    pub buffer_ms: u32,

    /// Buffers kept in flight with the device (default: 2).
    pub buffer_count: usize,

    /// How often the supervisor checks the running flag (default: 50).
    pub poll_interval_ms: u64,
}

impl MonitorConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        validate_format(&self.format)?;
        if self.buffer_ms == 0 {
            return Err("monitor buffer length must be positive".into());
        }
        if self.buffer_count == 0 {
            return Err("monitor needs at least one buffer".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("monitor poll interval must be positive".into());
        }
        Ok(())
    }
}

impl Default for MonitorConfiguration {
    fn default() -> Self {
        Self {
            format: WaveFormat::mono_16(44_100),
            buffer_ms: 250,
            buffer_count: 2,
            poll_interval_ms: 50,
        }
    }
}

/// Dedicated capture session that produces one WAV file per start/stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfiguration {
    /// Recording format (default: 44100 Hz, stereo, 16-bit).
    pub format: WaveFormat,

    /// Upper bound on a single recording; sizes the capture arena (default: 5).
    pub max_seconds: u32,

    /// How often the recording thread checks for stop or a full arena (default: 100).
    pub poll_interval_ms: u64,

    /// Directory where `output_<timestamp>.wav` files are written.
    pub output_directory: PathBuf,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        validate_format(&self.format)?;
        if self.max_seconds == 0 {
            return Err("maximum recording length must be positive".into());
        }
        if self.poll_interval_ms == 0 {
            return Err("recorder poll interval must be positive".into());
        }
        let arena = self.format.bytes_for_seconds(self.max_seconds);
        if arena > MAX_WAV_DATA_SIZE as u64 {
            return Err(format!(
                "{} s of {} is {} bytes, more than one WAV file can hold",
                self.max_seconds, self.format, arena
            ));
        }
        Ok(())
    }

    /// Size of the capture arena: `sample_rate * channels * max_seconds` samples.
    ///
    /// A validated configuration keeps this within `MAX_WAV_DATA_SIZE`.
    pub fn arena_bytes(&self) -> usize {
        self.format.bytes_for_seconds(self.max_seconds) as usize
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            format: WaveFormat::stereo_16(44_100),
            max_seconds: 5,
            poll_interval_ms: 100,
            output_directory: PathBuf::from("."),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfiguration {
    pub monitor: MonitorConfiguration,
    pub recorder: RecorderConfiguration,

    /// Auto-record threshold in percent of full scale (default: 10.0).
    pub threshold: f64,

    /// Capacity of the level queue (default: 100).
    pub level_queue_capacity: usize,
}

impl EngineConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        self.monitor.validate()?;
        self.recorder.validate()?;
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(format!("threshold out of range: {}", self.threshold));
        }
        if self.level_queue_capacity == 0 {
            return Err("level queue capacity must be positive".into());
        }
        Ok(())
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, CaptureError> {
        let json = fs::read_to_string(path).map_err(|e| {
            CaptureError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            CaptureError::ConfigurationFailed(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            monitor: MonitorConfiguration::default(),
            recorder: RecorderConfiguration::default(),
            threshold: DEFAULT_THRESHOLD,
            level_queue_capacity: DEFAULT_LEVEL_QUEUE_CAPACITY,
        }
    }
}

fn validate_format(format: &WaveFormat) -> Result<(), String> {
    if format.sample_rate == 0 {
        return Err("sample rate must be positive".into());
    }
    if format.bits_per_sample != 16 {
        return Err(format!("unsupported bit depth: {}", format.bits_per_sample));
    }
    if ![1, 2].contains(&format.channels) {
        return Err(format!("unsupported channel count: {}", format.channels));
    }
    if format.checked_avg_bytes_per_sec().is_none() {
        return Err(format!("sample rate too high: {}", format.sample_rate));
    }
    Ok(())
}
