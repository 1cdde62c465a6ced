use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use spectrum_stream_core::{
    CaptureConfig, ChannelSink, MicrophoneStreamer, SinkEvent, StartStatus, StopStatus,
    StreamOverrides,
};
use spectrum_stream_cpal::{list_input_devices, CpalMicrophone};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("spectrum-probe error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "spectrum-probe", about = "Stream microphone spectra to the log")]
struct Cli {
    /// TOML file with an [Audio] table.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Input device name (see --list-devices). Defaults to the host default.
    #[arg(long)]
    device: Option<String>,
    /// Capture rate in Hz for this run.
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Samples per frame for this run.
    #[arg(long)]
    window_size: Option<usize>,
    /// How long to stream before stopping.
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,
    /// Print every event as a JSON line instead of logging peaks.
    #[arg(long)]
    json: bool,
    /// List input devices and exit.
    #[arg(long)]
    list_devices: bool,
}

impl Cli {
    fn execute(self) -> Result<()> {
        if self.list_devices {
            return list_devices();
        }

        let config = match &self.config {
            Some(path) => CaptureConfig::load_from(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => CaptureConfig::default(),
        };
        let overrides = StreamOverrides {
            sample_rate: self.sample_rate,
            window_size: self.window_size,
        };
        let duration = Duration::try_from_secs_f64(self.seconds)
            .with_context(|| format!("invalid duration {}", self.seconds))?;

        let device = match &self.device {
            Some(name) => CpalMicrophone::with_device(name.clone()),
            None => CpalMicrophone::default_device(),
        };
        let (sink, events) = ChannelSink::bounded(64);
        let streamer = MicrophoneStreamer::new(device, config, Arc::new(sink))?;

        let info = streamer.device_info();
        log::info!("using input device {} ({} channel(s))", info.name, info.channels);

        let overrides = (!overrides.is_empty()).then_some(overrides);
        if streamer.start(overrides)? == StartStatus::AlreadyRunning {
            log::warn!("streamer was already running");
        }

        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match events.recv_timeout(remaining) {
                Ok(event) => self.report(&event)?,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if !streamer.is_streaming() {
                log::warn!("stream ended before the requested duration");
                break;
            }
        }

        let report = match streamer.stop() {
            StopStatus::Stopped(report) => Some(report),
            StopStatus::NotRunning => streamer.last_report(),
        };
        while let Ok(event) = events.try_recv() {
            self.report(&event)?;
        }
        if let Some(report) = report {
            let summary = SinkEvent::SessionFinished(report.clone()).to_json()?;
            log::info!("session report: {}", summary);
            if report.is_error() {
                anyhow::bail!("session ended with {:?}", report.outcome);
            }
        }
        Ok(())
    }

    fn report(&self, event: &SinkEvent) -> Result<()> {
        if self.json {
            println!("{}", event.to_json()?);
            return Ok(());
        }
        match event {
            SinkEvent::Spectrum(frame) => {
                if let Some((freq, level)) = frame.peak() {
                    log::info!("max freq: {:.1} Hz @ {:.1} dB", freq, level);
                }
            }
            SinkEvent::Error { error } => log::error!("audio error: {}", error),
            SinkEvent::StateChanged { state } => log::debug!("state: {:?}", state),
            SinkEvent::SessionFinished(_) => {}
        }
        Ok(())
    }
}

fn list_devices() -> Result<()> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        println!("no input devices found");
    }
    for device in devices {
        let marker = if device.is_default { "*" } else { " " };
        let rate = device
            .default_sample_rate
            .map(|r| format!("{r} Hz"))
            .unwrap_or_else(|| "unknown rate".into());
        println!("{marker} {} ({rate}, {} channel(s))", device.name, device.channels);
    }
    Ok(())
}
