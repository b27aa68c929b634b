//! # mic-level-core
//!
//! Platform-agnostic microphone level monitor with threshold-triggered
//! recording.
//!
//! A monitor session keeps a small pool of capture buffers cycling through
//! the input device and publishes one peak level per completed buffer. When
//! the level rises above the threshold a separate recording session captures
//! into one large buffer until the level falls back, then writes a WAV file.
//! Platform backends implement the `InputDevice` trait and plug into the
//! `LevelEngine`.
//!
//! ## Architecture
//!
//! ```text
//! mic-level-core (this crate)
//! ├── traits/       ← InputDevice, DeviceFactory, EngineDelegate
//! ├── models/       ← WaveFormat, CaptureError, configuration, record state, outcomes
//! ├── processing/   ← level meter, auto-record controller, buffer pool, WAV header
//! ├── session/      ← LevelChannel, MonitorLoop, Recorder, LevelEngine
//! └── storage/      ← WavFileWriter, output file naming
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{
    EngineConfiguration, MonitorConfiguration, RecorderConfiguration, DEFAULT_LEVEL_QUEUE_CAPACITY,
    DEFAULT_THRESHOLD,
};
pub use models::error::{CaptureError, DeviceOperation};
pub use models::format::WaveFormat;
pub use models::recording_result::{RecordingOutcome, RecordingResult};
pub use models::state::{AutoRecordState, RecordCommand};
pub use processing::auto_record::AutoRecordController;
pub use processing::buffer_pool::{BufferPool, CaptureBuffer};
pub use processing::level_meter::{compute_level, format_percent, render_bar, LevelZone};
pub use session::engine::LevelEngine;
pub use session::level_channel::LevelChannel;
pub use session::monitor::{MonitorContext, MonitorLoop};
pub use session::recorder::Recorder;
pub use storage::wav_writer::WavFileWriter;
pub use traits::engine_delegate::EngineDelegate;
pub use traits::input_device::{CompletionHandler, DeviceFactory, InputDevice, SharedDeviceFactory};
