//! In-memory input device used to drive sessions in tests.
//!
//! The test thread plays the driver: `DeviceHarness::feed_samples` pours PCM
//! into queued buffers and invokes the completion handler for each one that
//! fills, exactly as a platform callback would.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::models::error::{CaptureError, DeviceOperation};
use crate::models::format::WaveFormat;
use crate::processing::buffer_pool::CaptureBuffer;
use crate::traits::input_device::{CompletionHandler, DeviceFactory, InputDevice};

#[derive(Default)]
struct HarnessState {
    queue: VecDeque<CaptureBuffer>,
    handler: Option<CompletionHandler>,
    format: Option<WaveFormat>,
    open: bool,
    started: bool,
    fail_on: Option<DeviceOperation>,
    opens: usize,
    closes: usize,
}

#[derive(Clone, Default)]
pub(crate) struct DeviceHarness {
    state: Arc<Mutex<HarnessState>>,
}

impl DeviceHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, operation: DeviceOperation) {
        self.state.lock().fail_on = Some(operation);
    }

    pub fn queued_indices(&self) -> Vec<usize> {
        self.state.lock().queue.iter().map(CaptureBuffer::index).collect()
    }

    pub fn queued_capacities(&self) -> Vec<usize> {
        self.state.lock().queue.iter().map(CaptureBuffer::capacity).collect()
    }

    pub fn format(&self) -> Option<WaveFormat> {
        self.state.lock().format
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Deliver samples as the driver would. Returns how many buffers completed.
    pub fn feed_samples(&self, samples: &[i16]) -> usize {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        self.feed_bytes(&bytes)
    }

    pub fn feed_bytes(&self, mut bytes: &[u8]) -> usize {
        let mut completed = 0;
        while !bytes.is_empty() {
            let (full, mut handler) = {
                let mut state = self.state.lock();
                if !state.started {
                    return completed;
                }
                let Some(front) = state.queue.front_mut() else {
                    return completed;
                };
                let written = front.write(bytes);
                bytes = &bytes[written..];
                if !front.is_full() {
                    continue;
                }
                let Some(full) = state.queue.pop_front() else {
                    continue;
                };
                (full, state.handler.take())
            };

            completed += 1;
            let resubmit = handler.as_mut().and_then(|h| h(full));

            let mut state = self.state.lock();
            if state.open && state.handler.is_none() {
                state.handler = handler;
            }
            if let Some(mut buffer) = resubmit {
                buffer.clear();
                state.queue.push_back(buffer);
            }
        }
        completed
    }

    fn check(&self, operation: DeviceOperation) -> Result<(), CaptureError> {
        if self.state.lock().fail_on == Some(operation) {
            return Err(CaptureError::device(operation, "scripted failure"));
        }
        Ok(())
    }
}

pub(crate) struct ScriptedDevice {
    harness: DeviceHarness,
}

impl ScriptedDevice {
    pub fn new(harness: DeviceHarness) -> Self {
        Self { harness }
    }
}

impl InputDevice for ScriptedDevice {
    fn name(&self) -> String {
        "scripted input".into()
    }

    fn open(
        &mut self,
        format: WaveFormat,
        on_complete: CompletionHandler,
    ) -> Result<(), CaptureError> {
        self.harness.check(DeviceOperation::Open)?;
        let mut state = self.harness.state.lock();
        state.format = Some(format);
        state.handler = Some(on_complete);
        state.open = true;
        state.opens += 1;
        Ok(())
    }

    fn add_buffer(&mut self, buffer: CaptureBuffer) -> Result<(), CaptureError> {
        self.harness.check(DeviceOperation::AddBuffer)?;
        self.harness.state.lock().queue.push_back(buffer);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        self.harness.check(DeviceOperation::Start)?;
        self.harness.state.lock().started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.harness.state.lock().started = false;
        Ok(())
    }

    fn reset(&mut self) -> Vec<CaptureBuffer> {
        let mut state = self.harness.state.lock();
        state.started = false;
        state.queue.drain(..).collect()
    }

    fn close(&mut self) {
        let mut state = self.harness.state.lock();
        if state.open {
            state.closes += 1;
        }
        state.open = false;
        state.started = false;
        state.handler = None;
    }
}

/// Hands out scripted devices and remembers their harnesses in creation order.
#[derive(Clone, Default)]
pub(crate) struct ScriptedFactory {
    created: Arc<Mutex<Vec<DeviceHarness>>>,
    failures: Arc<Mutex<VecDeque<Option<DeviceOperation>>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next device created fails on `operation` (`None` for no failure).
    pub fn plan(&self, operation: Option<DeviceOperation>) {
        self.failures.lock().push_back(operation);
    }

    pub fn created(&self) -> usize {
        self.created.lock().len()
    }

    pub fn harness(&self, index: usize) -> Option<DeviceHarness> {
        self.created.lock().get(index).cloned()
    }
}

impl DeviceFactory for ScriptedFactory {
    fn create(&self) -> Box<dyn InputDevice> {
        let harness = DeviceHarness::new();
        if let Some(Some(operation)) = self.failures.lock().pop_front() {
            harness.fail_on(operation);
        }
        self.created.lock().push(harness.clone());
        Box::new(ScriptedDevice::new(harness))
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Fresh, empty directory under the system temp dir.
pub(crate) fn temp_output_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mic_level_test_{}_{}", name, std::process::id()));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub(crate) fn wav_files_in(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "wav"))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}
