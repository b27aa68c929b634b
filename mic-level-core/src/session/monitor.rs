use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};

use crate::models::config::MonitorConfiguration;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingOutcome;
use crate::models::state::RecordCommand;
use crate::processing::auto_record::AutoRecordController;
use crate::processing::buffer_pool::{BufferPool, CaptureBuffer};
use crate::processing::level_meter::compute_level_le_bytes;
use crate::traits::engine_delegate::EngineDelegate;
use crate::traits::input_device::{CompletionHandler, InputDevice, SharedDeviceFactory};

use super::level_channel::LevelChannel;
use super::recorder::Recorder;

/// Everything one monitoring run needs, handed to its supervisor thread.
pub struct MonitorContext {
    pub config: MonitorConfiguration,
    pub factory: SharedDeviceFactory,
    pub channel: Arc<LevelChannel>,
    pub recorder: Arc<Recorder>,
    pub threshold: f64,
    pub delegate: Option<Arc<dyn EngineDelegate>>,
}

impl MonitorContext {
    fn notify(&self, f: impl FnOnce(&dyn EngineDelegate)) {
        if let Some(ref delegate) = self.delegate {
            f(delegate.as_ref());
        }
    }

    fn report_finished(&self, outcome: &RecordingOutcome) {
        self.notify(|d| d.on_recording_finished(outcome));
    }
}

/// Continuous level monitoring.
///
/// ```text
/// [device callback] ─ buffer full ─▶ level ─▶ LevelChannel
///        │                              │
///        ◀── clear + resubmit ──────────┤
///                                       ▼
///                         AutoRecordController ─ Start/Stop ─▶ [mic-monitor] ─▶ Recorder
/// ```
///
/// The callback never blocks: record commands cross to the `mic-monitor`
/// supervisor thread over a channel, and the supervisor drives the recorder.
/// Clearing the shared `running` flag from any thread (an interrupt handler,
/// for instance) ends the run within one poll interval.
pub struct MonitorLoop {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorLoop {
    /// Open the device, prime the buffer pool and begin monitoring.
    ///
    /// Returns once the device is running, or with the error that stopped it.
    pub fn start(context: MonitorContext, running: Arc<AtomicBool>) -> Result<Self, CaptureError> {
        running.store(true, Ordering::SeqCst);

        let (ready_tx, ready_rx) = bounded(1);
        let flag = Arc::clone(&running);
        let spawned = thread::Builder::new()
            .name("mic-monitor".into())
            .spawn(move || supervise(context, flag, ready_tx));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                log::error!("Failed to spawn monitor thread: {}", e);
                return Err(CaptureError::ThreadSpawn(e.to_string()));
            }
        };

        // the supervisor reports before returning, so a dropped sender means it panicked
        let startup = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::ThreadPanicked("mic-monitor".into())));
        if let Err(e) = startup {
            running.store(false, Ordering::SeqCst);
            handle.join().ok();
            return Err(e);
        }

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// True until the running flag is cleared and the supervisor has exited.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Clear the running flag and wait for the device to be released.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn supervise(
    context: MonitorContext,
    running: Arc<AtomicBool>,
    ready: Sender<Result<(), CaptureError>>,
) {
    let mut device = context.factory.create();
    let (commands_tx, commands_rx) = unbounded();

    let on_complete = level_handler(
        Arc::clone(&context.channel),
        AutoRecordController::new(context.threshold),
        commands_tx,
    );

    if let Err(e) = open_and_start(device.as_mut(), &context.config, on_complete) {
        log::error!("Failed to start monitoring on {}: {}", device.name(), e);
        device.reset();
        device.close();
        ready.send(Err(e)).ok();
        return;
    }
    ready.send(Ok(())).ok();

    log::info!(
        "Monitoring {} ({}, {} x {} ms buffers)",
        device.name(),
        context.config.format,
        context.config.buffer_count,
        context.config.buffer_ms
    );
    context.notify(|d| d.on_monitoring_changed(true));

    run_until_stopped(&context, &running, &commands_rx);

    if let Err(e) = device.stop() {
        log::warn!("Failed to stop monitoring device: {}", e);
    }
    device.reset();
    device.close();

    if let Some(outcome) = context.recorder.stop() {
        context.report_finished(&outcome);
    }
    if let Some(outcome) = context.recorder.take_finished() {
        context.report_finished(&outcome);
    }

    context.channel.close();
    log::info!("Monitoring stopped");
    context.notify(|d| d.on_monitoring_changed(false));
}

fn run_until_stopped(
    context: &MonitorContext,
    running: &AtomicBool,
    commands: &Receiver<RecordCommand>,
) {
    let poll = Duration::from_millis(context.config.poll_interval_ms);

    while running.load(Ordering::SeqCst) {
        match commands.recv_timeout(poll) {
            Ok(command) => apply(context, command),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Capture callback released; ending monitoring");
                running.store(false, Ordering::SeqCst);
            }
        }

        if let Some(outcome) = context.recorder.take_finished() {
            context.report_finished(&outcome);
        }
    }
}

fn apply(context: &MonitorContext, command: RecordCommand) {
    match command {
        RecordCommand::Start => match context.recorder.start() {
            Ok(true) => context.notify(|d| d.on_recording_started()),
            Ok(false) => log::debug!("Recording already active"),
            Err(e) => context.notify(|d| d.on_error(&e)),
        },
        RecordCommand::Stop => {
            if let Some(outcome) = context.recorder.stop() {
                context.report_finished(&outcome);
            }
        }
    }
}

fn open_and_start(
    device: &mut dyn InputDevice,
    config: &MonitorConfiguration,
    on_complete: CompletionHandler,
) -> Result<(), CaptureError> {
    device.open(config.format, on_complete)?;
    BufferPool::for_period(&config.format, config.buffer_ms, config.buffer_count)
        .submit_all(device)?;
    device.start()
}

/// Completion handler for the monitor device: meter, publish, decide, recycle.
fn level_handler(
    channel: Arc<LevelChannel>,
    mut controller: AutoRecordController,
    commands: Sender<RecordCommand>,
) -> CompletionHandler {
    Box::new(move |mut buffer: CaptureBuffer| {
        let level = compute_level_le_bytes(buffer.filled());
        channel.publish(level);
        if let Some(command) = controller.on_level(level) {
            commands.send(command).ok();
        }
        buffer.clear();
        Some(buffer)
    })
}
