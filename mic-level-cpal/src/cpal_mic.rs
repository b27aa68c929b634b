//! cpal input device.
//!
//! Opens the default input of the default host with the exact requested
//! format. Whatever sample type the device delivers is converted to 16-bit
//! little-endian PCM and copied into the queued capture buffers in order.

use std::collections::VecDeque;
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    FromSample, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfigRange,
};
use parking_lot::Mutex;

use mic_level_core::models::error::{CaptureError, DeviceOperation};
use mic_level_core::models::format::WaveFormat;
use mic_level_core::processing::buffer_pool::CaptureBuffer;
use mic_level_core::traits::input_device::{CompletionHandler, DeviceFactory, InputDevice};

/// Buffers waiting for audio plus the handler that takes them once full.
///
/// Shared between the owner thread and the cpal callback.
#[derive(Default)]
struct DeviceQueue {
    buffers: VecDeque<CaptureBuffer>,
    on_complete: Option<CompletionHandler>,
    scratch: Vec<u8>,
    dropped_bytes: u64,
    starved: bool,
}

impl DeviceQueue {
    /// Copy `bytes` into queued buffers, completing each one that fills.
    fn deliver(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let Some(front) = self.buffers.front_mut() else {
                if !self.starved {
                    log::debug!("No capture buffer queued; dropping input");
                    self.starved = true;
                }
                self.dropped_bytes += bytes.len() as u64;
                return;
            };
            self.starved = false;

            let written = front.write(bytes);
            bytes = &bytes[written..];
            if !front.is_full() {
                continue;
            }

            let Some(full) = self.buffers.pop_front() else {
                continue;
            };
            let resubmit = match self.on_complete.as_mut() {
                Some(handler) => handler(full),
                None => None,
            };
            if let Some(mut buffer) = resubmit {
                buffer.clear();
                self.buffers.push_back(buffer);
            }
        }
    }

    /// Convert one callback's worth of samples and deliver them.
    fn deliver_samples<T>(&mut self, data: &[T])
    where
        T: SizedSample,
        i16: FromSample<T>,
    {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        append_le_bytes(&mut scratch, data);
        self.deliver(&scratch);
        self.scratch = scratch;
    }
}

/// Append `data` as signed 16-bit little-endian PCM.
pub fn append_le_bytes<T>(out: &mut Vec<u8>, data: &[T])
where
    T: SizedSample,
    i16: FromSample<T>,
{
    out.reserve(data.len() * 2);
    for &sample in data {
        out.extend_from_slice(&i16::from_sample_(sample).to_le_bytes());
    }
}

/// Rank of a device sample format; lower is preferred. `None` if unsupported.
pub fn format_preference(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

/// Pick the supported range matching `format` exactly, preferring native i16.
pub fn select_range(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    format: &WaveFormat,
) -> Option<SupportedStreamConfigRange> {
    let rate = SampleRate(format.sample_rate);
    ranges
        .into_iter()
        .filter(|r| r.channels() == format.channels)
        .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
        .filter_map(|r| format_preference(r.sample_format()).map(|rank| (rank, r)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, r)| r)
}

/// Default system microphone via cpal.
///
/// The cpal stream is built on `start` and dropped on `stop`, so a device
/// must stay on the thread that opened it.
pub struct CpalInputDevice {
    device: Option<cpal::Device>,
    stream_config: Option<(StreamConfig, SampleFormat)>,
    queue: Arc<Mutex<DeviceQueue>>,
    stream: Option<cpal::Stream>,
    device_name: String,
}

impl CpalInputDevice {
    pub fn new() -> Self {
        Self {
            device: None,
            stream_config: None,
            queue: Arc::new(Mutex::new(DeviceQueue::default())),
            stream: None,
            device_name: "Default Microphone".into(),
        }
    }

    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        config: &StreamConfig,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: SizedSample,
        i16: FromSample<T>,
    {
        let queue = Arc::clone(&self.queue);
        device.build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                queue.lock().deliver_samples(data);
            },
            |err| log::error!("Input stream error: {}", err),
            None,
        )
    }
}

impl Default for CpalInputDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDevice for CpalInputDevice {
    fn name(&self) -> String {
        self.device_name.clone()
    }

    fn open(
        &mut self,
        format: WaveFormat,
        on_complete: CompletionHandler,
    ) -> Result<(), CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::device(DeviceOperation::Open, "no default input device"))?;
        self.device_name = device.name().unwrap_or_else(|_| "Unknown device".into());

        let ranges = device
            .supported_input_configs()
            .map_err(|e| CaptureError::device(DeviceOperation::Prepare, e))?;
        let range = select_range(ranges, &format).ok_or_else(|| {
            CaptureError::device(
                DeviceOperation::Prepare,
                format!("{} not supported by {}", format, self.device_name),
            )
        })?;

        let sample_format = range.sample_format();
        let config = range.with_sample_rate(SampleRate(format.sample_rate)).config();
        log::debug!(
            "Opened {} ({}, device samples {:?})",
            self.device_name,
            format,
            sample_format
        );

        {
            let mut queue = self.queue.lock();
            queue.on_complete = Some(on_complete);
            queue.dropped_bytes = 0;
            queue.starved = false;
        }
        self.stream_config = Some((config, sample_format));
        self.device = Some(device);
        Ok(())
    }

    fn add_buffer(&mut self, buffer: CaptureBuffer) -> Result<(), CaptureError> {
        if self.device.is_none() {
            return Err(CaptureError::device(DeviceOperation::AddBuffer, "device not open"));
        }
        self.queue.lock().buffers.push_back(buffer);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let (Some(device), Some((config, sample_format))) =
            (self.device.as_ref(), self.stream_config.as_ref())
        else {
            return Err(CaptureError::device(DeviceOperation::Start, "device not open"));
        };

        let stream = match sample_format {
            SampleFormat::I16 => self.build_stream::<i16>(device, config),
            SampleFormat::F32 => self.build_stream::<f32>(device, config),
            SampleFormat::U16 => self.build_stream::<u16>(device, config),
            other => {
                return Err(CaptureError::device(
                    DeviceOperation::Start,
                    format!("unsupported sample format {:?}", other),
                ))
            }
        }
        .map_err(|e| CaptureError::device(DeviceOperation::Start, e))?;

        stream
            .play()
            .map_err(|e| CaptureError::device(DeviceOperation::Start, e))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::debug!("Pause before stop failed: {}", e);
            }
        }
        let dropped = self.queue.lock().dropped_bytes;
        if dropped > 0 {
            log::debug!(
                "{} dropped {} bytes while no buffer was queued",
                self.device_name,
                dropped
            );
        }
        Ok(())
    }

    fn reset(&mut self) -> Vec<CaptureBuffer> {
        self.stream = None;
        self.queue.lock().buffers.drain(..).collect()
    }

    fn close(&mut self) {
        self.stream = None;
        {
            let mut queue = self.queue.lock();
            queue.buffers.clear();
            queue.on_complete = None;
        }
        self.stream_config = None;
        self.device = None;
    }
}

impl Drop for CpalInputDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates a `CpalInputDevice` per capture session.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalDeviceFactory;

impl DeviceFactory for CpalDeviceFactory {
    fn create(&self) -> Box<dyn InputDevice> {
        Box::new(CpalInputDevice::new())
    }
}
