//! `mic-level`: live microphone level meter that records loud passages.
//!
//! Prints one line per capture buffer and writes an
//! `output_<timestamp>.wav` file each time the level rises above the
//! threshold and falls back. Ctrl+C stops monitoring and finishes any
//! recording in progress.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use mic_level_core::{
    format_percent, render_bar, CaptureError, EngineConfiguration, EngineDelegate, LevelEngine,
    LevelZone, RecordingOutcome, WaveFormat,
};
use mic_level_cpal::CpalDeviceFactory;

const LEVEL_WAIT: Duration = Duration::from_millis(200);

#[derive(Parser, Debug)]
#[command(name = "mic-level")]
#[command(version)]
#[command(about = "Microphone level meter with threshold-triggered WAV recording")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for recorded WAV files
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Level in percent above which recording starts
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Longest single recording in seconds
    #[arg(long, value_name = "SECONDS")]
    record_seconds: Option<u32>,

    /// Recording channel count (1 or 2)
    #[arg(long, value_name = "N")]
    record_channels: Option<u16>,

    /// Recording sample rate in Hz
    #[arg(long, value_name = "HZ")]
    record_rate: Option<u32>,

    /// Do not print the level meter
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn engine_configuration(&self) -> Result<EngineConfiguration> {
        let mut config = match self.config {
            Some(ref path) => EngineConfiguration::from_json_file(path)?,
            None => EngineConfiguration::default(),
        };

        if let Some(ref dir) = self.output_dir {
            config.recorder.output_directory = dir.clone();
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(seconds) = self.record_seconds {
            config.recorder.max_seconds = seconds;
        }
        if self.record_channels.is_some() || self.record_rate.is_some() {
            let current = config.recorder.format;
            config.recorder.format = WaveFormat::new(
                self.record_rate.unwrap_or(current.sample_rate),
                self.record_channels.unwrap_or(current.channels),
                current.bits_per_sample,
            );
        }

        config
            .validate()
            .map_err(CaptureError::ConfigurationFailed)
            .context("invalid configuration")?;
        Ok(config)
    }
}

/// Reports recording events on stderr so they do not interleave with the meter.
struct ConsoleDelegate;

impl EngineDelegate for ConsoleDelegate {
    fn on_monitoring_changed(&self, running: bool) {
        log::debug!("Monitoring {}", if running { "started" } else { "stopped" });
    }

    fn on_recording_started(&self) {
        eprintln!("\n● recording");
    }

    fn on_recording_finished(&self, outcome: &RecordingOutcome) {
        match outcome {
            RecordingOutcome::Saved(result) => eprintln!(
                "\n■ saved {} ({:.2} s, sha256 {})",
                result.file_path.display(),
                result.duration_secs,
                &result.checksum[..12.min(result.checksum.len())]
            ),
            RecordingOutcome::NoDataRecorded => eprintln!("\n■ no data recorded"),
            RecordingOutcome::Failed(e) => eprintln!("\n■ recording failed: {}", e),
        }
    }

    fn on_error(&self, error: &CaptureError) {
        eprintln!("\n! {}", error);
    }
}

fn meter_line(level: f64) -> String {
    let zone = match LevelZone::classify(level) {
        LevelZone::Quiet => "quiet",
        LevelZone::Moderate => "moderate",
        LevelZone::Loud => "loud",
    };
    format!("{:>3}% |{:<34}| {}", format_percent(level), render_bar(level), zone)
}

fn run(args: Args) -> Result<()> {
    let config = args.engine_configuration()?;
    log::info!(
        "Threshold {:.1}%, recording {} up to {} s into {}",
        config.threshold,
        config.recorder.format,
        config.recorder.max_seconds,
        config.recorder.output_directory.display()
    );

    let engine = LevelEngine::new(config, Arc::new(CpalDeviceFactory))?;
    engine.set_delegate(Arc::new(ConsoleDelegate));

    let running = engine.running_flag();
    ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
        .context("failed to install Ctrl+C handler")?;

    engine.start().context("failed to start monitoring")?;
    log::info!("Monitoring; press Ctrl+C to stop");

    let mut stdout = io::stdout();
    while engine.is_running() {
        let Some(level) = engine.next_level(LEVEL_WAIT) else {
            continue;
        };
        if !args.quiet {
            write!(stdout, "\r{}", meter_line(level))?;
            stdout.flush()?;
        }
    }

    engine.stop();
    if !args.quiet {
        writeln!(stdout)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Args::parse())
}
