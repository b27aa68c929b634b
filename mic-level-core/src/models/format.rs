use std::fmt;

use serde::{Deserialize, Serialize};

/// Uncompressed PCM format of a capture session.
///
/// Immutable once a session starts. `block_align` and `avg_bytes_per_sec`
/// are always derived, never stored, so they cannot drift from the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// 16-bit mono at `sample_rate`.
    pub const fn mono_16(sample_rate: u32) -> Self {
        Self::new(sample_rate, 1, 16)
    }

    /// 16-bit stereo at `sample_rate`.
    pub const fn stereo_16(sample_rate: u32) -> Self {
        Self::new(sample_rate, 2, 16)
    }

    /// Bytes per frame: `channels * bits_per_sample / 8`.
    pub const fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    /// Bytes per second: `sample_rate * block_align`.
    ///
    /// Saturates for formats whose byte rate cannot be stored in a WAV
    /// header; configuration validation rejects those.
    pub const fn avg_bytes_per_sec(&self) -> u32 {
        self.sample_rate.saturating_mul(self.block_align() as u32)
    }

    /// Byte rate, or `None` if it does not fit the header's 32-bit field.
    pub const fn checked_avg_bytes_per_sec(&self) -> Option<u32> {
        self.sample_rate.checked_mul(self.block_align() as u32)
    }

    /// Bytes needed for `millis` of audio, rounded down to whole frames.
    ///
    /// Never returns less than one frame.
    pub fn bytes_for_millis(&self, millis: u32) -> usize {
        let align = self.block_align().max(1) as u64;
        let raw = self.avg_bytes_per_sec() as u64 * millis as u64 / 1000;
        (raw - raw % align).max(align) as usize
    }

    /// Bytes needed for `seconds` of audio.
    pub fn bytes_for_seconds(&self, seconds: u32) -> u64 {
        self.avg_bytes_per_sec() as u64 * seconds as u64
    }

    /// Playback duration of `bytes` of audio in this format.
    pub fn duration_secs(&self, bytes: usize) -> f64 {
        match self.avg_bytes_per_sec() {
            0 => 0.0,
            rate => bytes as f64 / rate as f64,
        }
    }
}

impl Default for WaveFormat {
    fn default() -> Self {
        Self::mono_16(44_100)
    }
}

impl fmt::Display for WaveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}-bit",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_fields_mono() {
        let format = WaveFormat::mono_16(44_100);
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.avg_bytes_per_sec(), 88_200);
    }

    #[test]
    fn derived_fields_stereo() {
        let format = WaveFormat::stereo_16(48_000);
        assert_eq!(format.block_align(), 4);
        assert_eq!(format.avg_bytes_per_sec(), 192_000);
    }

    #[test]
    fn monitor_period_is_quarter_second() {
        let format = WaveFormat::mono_16(44_100);
        assert_eq!(format.bytes_for_millis(250), 22_050);
    }

    #[test]
    fn period_rounds_down_to_whole_frames() {
        // 44100 * 4 * 7 / 1000 = 1234.8 -> 1234 -> 1232 (multiple of 4)
        let format = WaveFormat::stereo_16(44_100);
        assert_eq!(format.bytes_for_millis(7), 1232);
        assert_eq!(format.bytes_for_millis(7) % 4, 0);
    }

    #[test]
    fn tiny_period_still_holds_one_frame() {
        let format = WaveFormat::stereo_16(8_000);
        assert_eq!(format.bytes_for_millis(0), 4);
    }

    #[test]
    fn oversized_byte_rate_is_detected() {
        let format = WaveFormat::stereo_16(2_000_000_000);
        assert_eq!(format.checked_avg_bytes_per_sec(), None);
        assert_eq!(format.avg_bytes_per_sec(), u32::MAX);
        assert_eq!(WaveFormat::mono_16(8_000).checked_avg_bytes_per_sec(), Some(16_000));
    }

    #[test]
    fn duration_from_bytes() {
        let format = WaveFormat::stereo_16(44_100);
        assert_eq!(format.duration_secs(176_400), 1.0);
        assert_eq!(format.duration_secs(0), 0.0);
    }
}
