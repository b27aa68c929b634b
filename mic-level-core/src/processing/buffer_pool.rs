use crate::models::error::CaptureError;
use crate::models::format::WaveFormat;
use crate::traits::input_device::InputDevice;

/// Byte buffer handed to the input device for one capture period.
///
/// While submitted, the device owns it exclusively; it comes back through the
/// completion handler (or `InputDevice::reset`) with `bytes_recorded` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureBuffer {
    data: Vec<u8>,
    bytes_recorded: usize,
    index: usize,
}

impl CaptureBuffer {
    pub fn new(index: usize, capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            bytes_recorded: 0,
            index,
        }
    }

    /// Position of this buffer within its pool.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn bytes_recorded(&self) -> usize {
        self.bytes_recorded
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.bytes_recorded
    }

    pub fn is_full(&self) -> bool {
        self.bytes_recorded == self.data.len()
    }

    /// The part of the buffer the device has filled.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.bytes_recorded]
    }

    /// Append as much of `bytes` as fits. Returns the number copied.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.remaining());
        let start = self.bytes_recorded;
        self.data[start..start + count].copy_from_slice(&bytes[..count]);
        self.bytes_recorded += count;
        count
    }

    /// Mark the buffer empty so it can be resubmitted.
    pub fn clear(&mut self) {
        self.bytes_recorded = 0;
    }

    /// Filled region decoded as little-endian 16-bit samples.
    pub fn samples(&self) -> Vec<i16> {
        self.filled()
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Consume the buffer, keeping only the filled bytes.
    pub fn into_filled(mut self) -> Vec<u8> {
        self.data.truncate(self.bytes_recorded);
        self.data
    }
}

/// Fixed set of pre-allocated capture buffers submitted round-robin.
///
/// With two or more buffers in flight the device keeps filling one while the
/// completion handler processes the other, so capture has no gaps.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Vec<CaptureBuffer>,
}

impl BufferPool {
    pub fn new(count: usize, bytes_per_buffer: usize) -> Self {
        Self {
            buffers: (0..count)
                .map(|index| CaptureBuffer::new(index, bytes_per_buffer))
                .collect(),
        }
    }

    /// `count` buffers each holding `period_ms` of audio in `format`.
    pub fn for_period(format: &WaveFormat, period_ms: u32, count: usize) -> Self {
        Self::new(count, format.bytes_for_millis(period_ms))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffer_bytes(&self) -> usize {
        self.buffers.first().map(CaptureBuffer::capacity).unwrap_or(0)
    }

    /// Hand every buffer to the device, in index order.
    ///
    /// On failure the buffers not yet submitted are released and the error
    /// is returned; buffers already queued come back through `reset`.
    pub fn submit_all(self, device: &mut dyn InputDevice) -> Result<(), CaptureError> {
        for buffer in self.buffers {
            let index = buffer.index();
            device.add_buffer(buffer).map_err(|e| {
                log::error!("Failed to submit capture buffer {}: {}", index, e);
                e
            })?;
        }
        Ok(())
    }
}
