use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::EngineConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingOutcome;
use crate::traits::engine_delegate::EngineDelegate;
use crate::traits::input_device::SharedDeviceFactory;

use super::level_channel::LevelChannel;
use super::monitor::{MonitorContext, MonitorLoop};
use super::recorder::Recorder;

/// Consumer-facing handle: start and stop monitoring, read levels.
///
/// All methods take `&self` and may be called from any thread.
pub struct LevelEngine {
    config: EngineConfiguration,
    factory: SharedDeviceFactory,
    channel: Arc<LevelChannel>,
    recorder: Arc<Recorder>,
    running: Arc<AtomicBool>,
    monitor: Mutex<Option<MonitorLoop>>,
    delegate: Mutex<Option<Arc<dyn EngineDelegate>>>,
}

impl LevelEngine {
    pub fn new(
        config: EngineConfiguration,
        factory: SharedDeviceFactory,
    ) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationFailed)?;

        let recorder = Recorder::new(config.recorder.clone(), Arc::clone(&factory));
        Ok(Self {
            channel: Arc::new(LevelChannel::with_capacity(config.level_queue_capacity)),
            recorder: Arc::new(recorder),
            running: Arc::new(AtomicBool::new(false)),
            monitor: Mutex::new(None),
            delegate: Mutex::new(None),
            factory,
            config,
        })
    }

    /// Manual recordings use it at once; monitoring picks it up on the next `start`.
    pub fn set_delegate(&self, delegate: Arc<dyn EngineDelegate>) {
        *self.delegate.lock() = Some(delegate);
    }

    pub fn config(&self) -> &EngineConfiguration {
        &self.config
    }

    /// Begin monitoring. Does nothing if already running.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut monitor = self.monitor.lock();
        let active = monitor.as_ref().is_some_and(MonitorLoop::is_running);
        if self.running.load(Ordering::SeqCst) && active {
            return Ok(());
        }
        if let Some(mut finished) = monitor.take() {
            finished.stop();
        }

        self.channel.reopen();
        let context = MonitorContext {
            config: self.config.monitor.clone(),
            factory: Arc::clone(&self.factory),
            channel: Arc::clone(&self.channel),
            recorder: Arc::clone(&self.recorder),
            threshold: self.config.threshold,
            delegate: self.delegate.lock().clone(),
        };
        *monitor = Some(MonitorLoop::start(context, Arc::clone(&self.running))?);
        Ok(())
    }

    /// End monitoring and any recording in progress. Blocks until the
    /// devices are released and a pending file is written.
    pub fn stop(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(mut monitor) = monitor {
            monitor.stop();
        }
        // a manual recording outlives the monitor
        self.finish_recording();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.monitor.lock().as_ref().is_some_and(MonitorLoop::is_running)
    }

    /// Shared flag an interrupt handler may clear to stop monitoring.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn latest_level(&self) -> f64 {
        self.channel.latest()
    }

    pub fn has_new_level(&self) -> bool {
        self.channel.has_new()
    }

    pub fn clear_levels(&self) {
        self.channel.clear();
    }

    /// Oldest unread level, waiting up to `timeout`. `None` on timeout or
    /// once monitoring has stopped and the queue is drained.
    pub fn next_level(&self, timeout: Duration) -> Option<f64> {
        self.channel.next(timeout)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Start a recording outside the threshold rule.
    ///
    /// A later quiet level still stops it if auto-record had armed.
    pub fn start_recording(&self) -> Result<bool, CaptureError> {
        self.report_arena_fill();
        let started = self.recorder.start()?;
        if started {
            self.notify(|d| d.on_recording_started());
        }
        Ok(started)
    }

    /// End the current recording and wait for its file.
    ///
    /// Also returns the outcome of a session that already ended because
    /// its arena filled.
    pub fn stop_recording(&self) -> Option<RecordingOutcome> {
        self.finish_recording()
    }

    fn finish_recording(&self) -> Option<RecordingOutcome> {
        let earlier = self.recorder.take_finished();
        let current = self.recorder.stop();
        for outcome in earlier.iter().chain(current.iter()) {
            self.notify(|d| d.on_recording_finished(outcome));
        }
        current.or(earlier)
    }

    fn report_arena_fill(&self) {
        if let Some(outcome) = self.recorder.take_finished() {
            self.notify(|d| d.on_recording_finished(&outcome));
        }
    }

    fn notify(&self, f: impl FnOnce(&dyn EngineDelegate)) {
        let delegate = self.delegate.lock().clone();
        if let Some(delegate) = delegate {
            f(delegate.as_ref());
        }
    }
}

impl Drop for LevelEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{MonitorConfiguration, RecorderConfiguration};
    use crate::models::error::DeviceOperation;
    use crate::models::format::WaveFormat;
    use crate::testing::{temp_output_dir, wait_until, wav_files_in, ScriptedFactory};
    use approx::assert_relative_eq;
    use std::path::Path;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);

    fn engine_in(dir: &Path) -> (LevelEngine, ScriptedFactory) {
        let factory = ScriptedFactory::new();
        let config = EngineConfiguration {
            monitor: MonitorConfiguration {
                format: WaveFormat::mono_16(8_000),
                buffer_ms: 100,
                buffer_count: 2,
                poll_interval_ms: 5,
            },
            recorder: RecorderConfiguration {
                format: WaveFormat::mono_16(8_000),
                max_seconds: 1,
                poll_interval_ms: 5,
                output_directory: dir.to_path_buf(),
            },
            ..Default::default()
        };
        let engine = LevelEngine::new(config, Arc::new(factory.clone())).unwrap();
        (engine, factory)
    }

    // 100 ms at 8 kHz mono
    fn buffer_of(amplitude: i16) -> Vec<i16> {
        vec![amplitude; 800]
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = EngineConfiguration {
            level_queue_capacity: 0,
            ..Default::default()
        };
        let result = LevelEngine::new(config, Arc::new(ScriptedFactory::new()));
        assert!(matches!(result, Err(CaptureError::ConfigurationFailed(_))));
    }

    #[test]
    fn start_is_idempotent_and_stop_releases_device() {
        let dir = temp_output_dir("engine_lifecycle");
        let (engine, factory) = engine_in(&dir);

        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_running());
        assert_eq!(factory.created(), 1);

        engine.stop();
        assert!(!engine.is_running());
        assert_eq!(factory.harness(0).unwrap().close_count(), 1);

        // channel is closed, so waiting consumers return immediately
        let started = Instant::now();
        assert_eq!(engine.next_level(WAIT), None);
        assert!(started.elapsed() < WAIT);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn consumer_reads_levels_in_order() {
        let dir = temp_output_dir("engine_levels");
        let (engine, factory) = engine_in(&dir);
        engine.start().unwrap();
        assert_eq!(engine.latest_level(), 0.0);
        assert!(!engine.has_new_level());

        let harness = factory.harness(0).unwrap();
        harness.feed_samples(&buffer_of(3_276));
        harness.feed_samples(&buffer_of(6_553));

        assert!(engine.has_new_level());
        assert_relative_eq!(engine.latest_level(), 6_553.0 / 327.67, epsilon = 1e-9);
        assert_relative_eq!(engine.next_level(WAIT).unwrap(), 3_276.0 / 327.67, epsilon = 1e-9);

        engine.clear_levels();
        assert!(!engine.has_new_level());
        assert_eq!(engine.next_level(Duration::from_millis(10)), None);
        assert_relative_eq!(engine.latest_level(), 6_553.0 / 327.67, epsilon = 1e-9);

        engine.stop();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn restart_opens_a_fresh_device() {
        let dir = temp_output_dir("engine_restart");
        let (engine, factory) = engine_in(&dir);

        engine.start().unwrap();
        engine.stop();
        engine.start().unwrap();

        assert_eq!(factory.created(), 2);
        factory.harness(1).unwrap().feed_samples(&buffer_of(i16::MAX));
        assert_eq!(engine.next_level(WAIT), Some(100.0));

        engine.stop();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn cleared_running_flag_stops_monitoring() {
        let dir = temp_output_dir("engine_flag");
        let (engine, factory) = engine_in(&dir);
        engine.start().unwrap();

        engine.running_flag().store(false, Ordering::SeqCst);

        assert!(!engine.is_running());
        let harness = factory.harness(0).unwrap();
        assert!(wait_until(WAIT, || !harness.is_open()));
        assert_eq!(engine.next_level(WAIT), None);

        // a later start brings monitoring back
        engine.start().unwrap();
        assert!(engine.is_running());
        engine.stop();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loud_burst_is_recorded_to_disk() {
        let dir = temp_output_dir("engine_burst");
        let (engine, factory) = engine_in(&dir);
        engine.start().unwrap();
        let monitor = factory.harness(0).unwrap();

        monitor.feed_samples(&buffer_of(16_000));
        assert!(wait_until(WAIT, || engine.is_recording()));

        let burst: Vec<i16> = (0..1_600).map(|i| ((i % 64) * 256) as i16).collect();
        factory.harness(1).unwrap().feed_samples(&burst);
        monitor.feed_samples(&buffer_of(0));

        assert!(wait_until(WAIT, || !engine.is_recording()));
        assert!(wait_until(WAIT, || wav_files_in(&dir).len() == 1));

        let files = wav_files_in(&dir);
        let mut reader = hound::WavReader::open(&files[0]).unwrap();
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, burst);

        engine.stop();
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn manual_recording_without_monitoring() {
        let dir = temp_output_dir("engine_manual");
        let (engine, factory) = engine_in(&dir);

        assert!(engine.start_recording().unwrap());
        assert!(engine.is_recording());
        factory.harness(0).unwrap().feed_samples(&[5i16; 80]);

        let outcome = engine.stop_recording().unwrap();
        assert!(outcome.is_saved());
        assert_eq!(engine.stop_recording(), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<&'static str>>);

    impl EngineDelegate for Events {
        fn on_monitoring_changed(&self, _running: bool) {}
        fn on_recording_started(&self) {
            self.0.lock().push("started");
        }
        fn on_recording_finished(&self, outcome: &RecordingOutcome) {
            self.0.lock().push(if outcome.is_saved() { "saved" } else { "unsaved" });
        }
        fn on_error(&self, _error: &CaptureError) {
            self.0.lock().push("error");
        }
    }

    #[test]
    fn stop_ends_manual_recording() {
        let dir = temp_output_dir("engine_stop_manual");
        let (engine, factory) = engine_in(&dir);
        let events = Arc::new(Events::default());
        engine.set_delegate(events.clone());

        assert!(engine.start_recording().unwrap());
        factory.harness(0).unwrap().feed_samples(&[5i16; 80]);
        engine.stop();

        assert!(!engine.is_recording());
        assert_eq!(factory.harness(0).unwrap().close_count(), 1);
        assert_eq!(wav_files_in(&dir).len(), 1);
        assert_eq!(*events.0.lock(), vec!["started", "saved"]);
        assert_eq!(engine.stop_recording(), None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn manual_session_that_fills_its_arena_is_reported_once() {
        let dir = temp_output_dir("engine_manual_full");
        let (engine, factory) = engine_in(&dir);
        let events = Arc::new(Events::default());
        engine.set_delegate(events.clone());

        engine.start_recording().unwrap();
        // one second at 8 kHz mono fills the arena
        factory.harness(0).unwrap().feed_samples(&vec![900i16; 8_000]);
        assert!(wait_until(WAIT, || !engine.is_recording()));

        assert!(engine.stop_recording().is_some_and(|o| o.is_saved()));
        assert_eq!(engine.stop_recording(), None);
        engine.stop();
        assert_eq!(*events.0.lock(), vec!["started", "saved"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_start_leaves_engine_stopped() {
        let dir = temp_output_dir("engine_start_failure");
        let (engine, factory) = engine_in(&dir);
        factory.plan(Some(DeviceOperation::Start));

        let err = engine.start().unwrap_err();
        assert!(err.is_device_unavailable());
        assert!(!engine.is_running());

        engine.start().unwrap();
        assert!(engine.is_running());
        engine.stop();
        std::fs::remove_dir_all(&dir).ok();
    }
}
