use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;

use crate::models::config::RecorderConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::{RecordingOutcome, RecordingResult};
use crate::processing::buffer_pool::CaptureBuffer;
use crate::storage::wav_writer::{unique_recording_path, write_wav};
use crate::traits::input_device::{CompletionHandler, InputDevice, SharedDeviceFactory};

struct ActiveSession {
    stop_flag: Arc<AtomicBool>,
    handle: JoinHandle<RecordingOutcome>,
}

impl ActiveSession {
    fn finish(self) -> RecordingOutcome {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.handle.join().unwrap_or_else(|_| {
            log::error!("Recording thread panicked");
            RecordingOutcome::Failed(CaptureError::ThreadPanicked("mic-recorder".into()))
        })
    }
}

/// Threshold-triggered recorder.
///
/// Each `start` opens its own capture session on a dedicated thread with a
/// single buffer large enough for the maximum duration:
///
/// ```text
/// start ─▶ [mic-recorder thread] open ─▶ add arena ─▶ start
///                  │
///                  ├─ poll every interval: stop flag? arena full?
///                  │
///          stop ─▶ device stop/reset/close ─▶ output_<timestamp>.wav
/// ```
///
/// `stop` blocks until the file is written.
pub struct Recorder {
    config: RecorderConfiguration,
    factory: SharedDeviceFactory,
    active: Mutex<Option<ActiveSession>>,
    finished: Mutex<Option<RecordingOutcome>>,
}

impl Recorder {
    pub fn new(config: RecorderConfiguration, factory: SharedDeviceFactory) -> Self {
        Self {
            config,
            factory,
            active: Mutex::new(None),
            finished: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RecorderConfiguration {
        &self.config
    }

    /// Begin a recording session.
    ///
    /// Returns `Ok(false)` if one is already running. On device failure
    /// nothing stays allocated and the recorder remains idle.
    pub fn start(&self) -> Result<bool, CaptureError> {
        let mut active = self.active.lock();

        if let Some(session) = active.take() {
            if !session.handle.is_finished() {
                *active = Some(session);
                return Ok(false);
            }
            *self.finished.lock() = Some(session.finish());
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded(1);

        let config = self.config.clone();
        let factory = Arc::clone(&self.factory);
        let flag = Arc::clone(&stop_flag);
        let handle = thread::Builder::new()
            .name("mic-recorder".into())
            .spawn(move || run_session(config, factory, flag, ready_tx))
            .map_err(|e| {
                log::error!("Failed to spawn recording thread: {}", e);
                CaptureError::ThreadSpawn(e.to_string())
            })?;

        let session = ActiveSession { stop_flag, handle };
        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!(
                    "Recording started ({}, up to {} s)",
                    self.config.format,
                    self.config.max_seconds
                );
                *active = Some(session);
                Ok(true)
            }
            Ok(Err(e)) => {
                session.finish();
                Err(e)
            }
            Err(_) => match session.finish() {
                RecordingOutcome::Failed(e) => Err(e),
                _ => Err(CaptureError::ThreadSpawn(
                    "recording thread exited during startup".into(),
                )),
            },
        }
    }

    /// End the active session and wait for its file to be written.
    ///
    /// Returns `None` when nothing was recording.
    pub fn stop(&self) -> Option<RecordingOutcome> {
        let mut active = self.active.lock();
        let session = active.take()?;
        let outcome = session.finish();
        log_outcome(&outcome);
        Some(outcome)
    }

    pub fn is_recording(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// Outcome of a session that ended on its own because the arena filled.
    pub fn take_finished(&self) -> Option<RecordingOutcome> {
        if let Some(outcome) = self.finished.lock().take() {
            return Some(outcome);
        }

        let mut active = self.active.lock();
        if !active.as_ref().is_some_and(|s| s.handle.is_finished()) {
            return None;
        }
        let outcome = active.take()?.finish();
        log_outcome(&outcome);
        Some(outcome)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_session(
    config: RecorderConfiguration,
    factory: SharedDeviceFactory,
    stop_flag: Arc<AtomicBool>,
    ready: Sender<Result<(), CaptureError>>,
) -> RecordingOutcome {
    let mut device = factory.create();

    let completed: Arc<Mutex<Option<CaptureBuffer>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&completed);
    let on_complete: CompletionHandler = Box::new(move |buffer| {
        *slot.lock() = Some(buffer);
        None
    });

    if let Err(e) = open_and_start(device.as_mut(), &config, on_complete) {
        log::error!("Failed to start recording on {}: {}", device.name(), e);
        device.reset();
        device.close();
        ready.send(Err(e.clone())).ok();
        return RecordingOutcome::Failed(e);
    }
    ready.send(Ok(())).ok();

    let poll = Duration::from_millis(config.poll_interval_ms);
    while !stop_flag.load(Ordering::SeqCst) && completed.lock().is_none() {
        thread::sleep(poll);
    }

    if let Err(e) = device.stop() {
        log::warn!("Failed to stop recording device: {}", e);
    }
    let mut partial = device.reset();
    device.close();

    let buffer = completed.lock().take().or_else(|| partial.pop());
    let data = buffer.map(CaptureBuffer::into_filled).unwrap_or_default();
    save(&config, data)
}

fn open_and_start(
    device: &mut dyn InputDevice,
    config: &RecorderConfiguration,
    on_complete: CompletionHandler,
) -> Result<(), CaptureError> {
    device.open(config.format, on_complete)?;
    device.add_buffer(CaptureBuffer::new(0, config.arena_bytes()))?;
    device.start()
}

fn save(config: &RecorderConfiguration, data: Vec<u8>) -> RecordingOutcome {
    if data.is_empty() {
        return RecordingOutcome::NoDataRecorded;
    }

    let file_path = unique_recording_path(&config.output_directory, Local::now());
    match write_wav(&file_path, &config.format, &data) {
        Ok(checksum) => RecordingOutcome::Saved(RecordingResult {
            duration_secs: config.format.duration_secs(data.len()),
            bytes_recorded: data.len(),
            format: config.format,
            file_path,
            checksum,
        }),
        Err(e) => RecordingOutcome::Failed(e),
    }
}

fn log_outcome(outcome: &RecordingOutcome) {
    match outcome {
        RecordingOutcome::Saved(result) => log::info!(
            "Saved {} ({} bytes, {:.2} s)",
            result.file_path.display(),
            result.bytes_recorded,
            result.duration_secs
        ),
        RecordingOutcome::NoDataRecorded => log::info!("No data recorded"),
        RecordingOutcome::Failed(e) => log::error!("Recording failed: {}", e),
    }
}
