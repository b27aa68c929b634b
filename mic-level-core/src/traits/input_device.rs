use std::sync::Arc;

use crate::models::error::CaptureError;
use crate::models::format::WaveFormat;
use crate::processing::buffer_pool::CaptureBuffer;

/// Called on the driver's callback context each time a submitted buffer is full.
///
/// The closure carries the owning session's state, so no process-wide
/// instance is needed to route the callback. Returning `Some(buffer)`
/// resubmits it to the device before the callback returns; `None` releases it.
pub type CompletionHandler =
    Box<dyn FnMut(CaptureBuffer) -> Option<CaptureBuffer> + Send + 'static>;

/// Default PCM input device.
///
/// Implemented by:
/// - `CpalInputDevice` (mic-level-cpal)
///
/// A device is owned by exactly one session and used from the thread that
/// created it, so implementations need not be `Send`.
pub trait InputDevice {
    /// Human readable device name for diagnostics.
    fn name(&self) -> String;

    /// Open the default input with `format`, registering `on_complete`.
    fn open(
        &mut self,
        format: WaveFormat,
        on_complete: CompletionHandler,
    ) -> Result<(), CaptureError>;

    /// Queue an empty buffer for the device to fill.
    fn add_buffer(&mut self, buffer: CaptureBuffer) -> Result<(), CaptureError>;

    /// Begin delivering audio into queued buffers.
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Stop delivering audio. Queued buffers stay queued.
    fn stop(&mut self) -> Result<(), CaptureError>;

    /// Stop and hand back every queued buffer with whatever it holds.
    fn reset(&mut self) -> Vec<CaptureBuffer>;

    /// Release the device. Safe to call more than once.
    fn close(&mut self);
}

/// Creates a fresh device for each capture session.
pub trait DeviceFactory: Send + Sync {
    fn create(&self) -> Box<dyn InputDevice>;
}

impl<F> DeviceFactory for F
where
    F: Fn() -> Box<dyn InputDevice> + Send + Sync,
{
    fn create(&self) -> Box<dyn InputDevice> {
        self()
    }
}

pub type SharedDeviceFactory = Arc<dyn DeviceFactory>;
