//! Peak level metering for 16-bit PCM.
//!
//! The level is the largest absolute sample in a block as a percentage of
//! full scale (32767), saturating at 100. It is monotonic in the peak.

/// Full-scale magnitude of a signed 16-bit sample.
pub const FULL_SCALE: f64 = 32767.0;

/// Peak level (0–100) of a block of samples. An empty block is silent.
pub fn compute_level(samples: &[i16]) -> f64 {
    let peak = samples
        .iter()
        .map(|&s| (s as i32).abs())
        .max()
        .unwrap_or(0);
    level_from_peak(peak)
}

/// Peak level of little-endian 16-bit PCM bytes.
///
/// Used on the device callback path, so it scans in place without
/// allocating. A trailing odd byte is ignored.
pub fn compute_level_le_bytes(bytes: &[u8]) -> f64 {
    let peak = bytes
        .chunks_exact(2)
        .map(|pair| (i16::from_le_bytes([pair[0], pair[1]]) as i32).abs())
        .max()
        .unwrap_or(0);
    level_from_peak(peak)
}

fn level_from_peak(peak: i32) -> f64 {
    (peak as f64 / FULL_SCALE * 100.0).min(100.0)
}

/// Coarse loudness bands used by level displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelZone {
    /// Up to 20 %.
    Quiet,
    /// Above 20 % up to 50 %.
    Moderate,
    /// Above 50 %.
    Loud,
}

impl LevelZone {
    pub fn classify(level: f64) -> Self {
        if level > 50.0 {
            Self::Loud
        } else if level > 20.0 {
            Self::Moderate
        } else {
            Self::Quiet
        }
    }
}

/// Console bar: one `#` for each started 3 % of level.
pub fn render_bar(level: f64) -> String {
    let width = (level.clamp(0.0, 100.0) / 3.0).ceil() as usize;
    "#".repeat(width)
}

/// Level rounded half-up to a whole percentage.
pub fn format_percent(level: f64) -> u32 {
    (level.clamp(0.0, 100.0) + 0.5) as u32
}
