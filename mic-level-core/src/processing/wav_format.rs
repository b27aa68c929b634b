//! WAV file format utilities.
//!
//! Generates the canonical 44-byte RIFF header for uncompressed PCM and
//! patches its size fields once the data length is known.

use crate::models::error::CaptureError;
use crate::models::format::WaveFormat;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Largest data chunk whose RIFF size (`36 + data_size`) still fits in 32 bits.
pub const MAX_WAV_DATA_SIZE: u32 = u32::MAX - 36;

fn riff_chunk_size(data_size: u32) -> Result<u32, CaptureError> {
    data_size.checked_add(36).ok_or_else(|| {
        CaptureError::FileWriteFailure(format!("{} data bytes exceed WAV limit", data_size))
    })
}

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bits_per_sample / 8
/// [32-33]  block_align = channels * bits_per_sample / 8
/// [34-35]  bits_per_sample
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(
    format: &WaveFormat,
    data_size: u32,
) -> Result<[u8; WAV_HEADER_SIZE], CaptureError> {
    let chunk_size = riff_chunk_size(data_size)?;
    let byte_rate = format.checked_avg_bytes_per_sec().ok_or_else(|| {
        CaptureError::FileWriteFailure(format!("byte rate of {} exceeds WAV limit", format))
    })?;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&format.channels.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    Ok(header)
}

/// Patch the RIFF chunk size at offset 4 (`36 + data_size`).
pub fn patch_riff_size(header: &mut [u8], data_size: u32) -> Result<(), CaptureError> {
    header[4..8].copy_from_slice(&riff_chunk_size(data_size)?.to_le_bytes());
    Ok(())
}

/// Patch the data-size field at offset 40.
pub fn patch_data_size(header: &mut [u8], data_size: u32) {
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
}
