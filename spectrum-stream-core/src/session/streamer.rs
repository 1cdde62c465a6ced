use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::models::config::{CaptureConfig, StreamOverrides};
use crate::models::device_info::DeviceInfo;
use crate::models::error::StreamError;
use crate::models::session_report::SessionReport;
use crate::models::state::{SessionOutcome, StreamState};
use crate::session::capture_loop::{panic_message, CaptureLoop};
use crate::session::state_cell::StateCell;
use crate::traits::audio_device::AudioDevice;
use crate::traits::transport_sink::TransportSink;

/// Result of a `start` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartStatus {
    Started,
    AlreadyRunning,
}

/// Result of a `stop` call.
#[derive(Debug, Clone, PartialEq)]
pub enum StopStatus {
    Stopped(SessionReport),
    NotRunning,
}

/// Controller-side bookkeeping, guarded by the control lock.
struct Control {
    worker: Option<JoinHandle<SessionReport>>,
    last_report: Option<SessionReport>,
}

/// Microphone spectrum streamer.
///
/// Owns at most one capture thread at a time. `start` and `stop` are
/// serialized by an internal lock and may be called from any thread.
///
/// ```text
/// [AudioDevice] → read → [SpectralAverager] → [RateGate] → [TransportSink]
///                    └──────── capture thread ────────┘
/// ```
pub struct MicrophoneStreamer<D: AudioDevice> {
    device: Arc<D>,
    config: CaptureConfig,
    sink: Arc<dyn TransportSink>,
    state: Arc<StateCell>,
    control: Mutex<Control>,
}

impl<D: AudioDevice> MicrophoneStreamer<D> {
    /// Build a streamer; fails with `InvalidConfig` if `config` does not validate.
    pub fn new(device: D, config: CaptureConfig, sink: Arc<dyn TransportSink>) -> Result<Self, StreamError> {
        config.validate()?;
        Ok(Self {
            device: Arc::new(device),
            config,
            state: Arc::new(StateCell::new(Arc::clone(&sink))),
            sink,
            control: Mutex::new(Control {
                worker: None,
                last_report: None,
            }),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.device.describe()
    }

    pub fn state(&self) -> StreamState {
        self.state.get()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.get().is_streaming()
    }

    /// Report of the most recently finished session.
    pub fn last_report(&self) -> Option<SessionReport> {
        let mut control = self.control.lock();
        self.reap(&mut control);
        control.last_report.clone()
    }

    /// Open the device and begin streaming.
    ///
    /// Blocks until the device is open (→ `Started`), every retry has
    /// failed (→ `DeviceUnavailable`), or `stop` cancelled the connect
    /// (→ `Cancelled`). Overrides apply to this session only.
    pub fn start(&self, overrides: Option<StreamOverrides>) -> Result<StartStatus, StreamError> {
        let mut control = self.control.lock();
        self.reap(&mut control);

        if !self.state.get().is_idle() {
            log::info!("audio stream already running");
            return Ok(StartStatus::AlreadyRunning);
        }

        let config = match overrides {
            Some(overrides) => self.config.with_overrides(&overrides)?,
            None => self.config.clone(),
        };

        self.state.set(StreamState::Starting);

        let (ready_tx, ready_rx) = mpsc::channel();
        let capture = CaptureLoop::new(
            Arc::clone(&self.device),
            config,
            Arc::clone(&self.sink),
            Arc::clone(&self.state),
            ready_tx,
        );
        let worker = thread::Builder::new()
            .name("spectrum-capture".into())
            .spawn(move || capture.run())
            .map_err(|e| {
                self.state.set(StreamState::Idle);
                StreamError::Unknown(format!("failed to spawn capture thread: {}", e))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                control.worker = Some(worker);
                Ok(StartStatus::Started)
            }
            Ok(Err(err)) => {
                let report = self.join_worker(worker);
                control.last_report = Some(report);
                Err(err)
            }
            Err(_) => {
                // The thread died without reporting; it can only have panicked.
                let report = self.join_worker(worker);
                let message = match &report.outcome {
                    SessionOutcome::Aborted(message) => message.clone(),
                    other => format!("{:?}", other),
                };
                control.last_report = Some(report);
                self.state.set(StreamState::Idle);
                Err(StreamError::Unknown(format!(
                    "capture thread exited before opening the device: {}",
                    message
                )))
            }
        }
    }

    /// Stop streaming and wait until the device has been released.
    ///
    /// A `start` that is still connecting is cancelled and returns
    /// `Cancelled`. Returns `NotRunning` when there is nothing to stop;
    /// calling it twice is harmless.
    pub fn stop(&self) -> StopStatus {
        // A connecting `start` holds the control lock until the capture
        // thread reports back, so the cancel must happen before locking.
        let cancelled = self.state.transition(StreamState::Starting, StreamState::Stopping);
        let mut control = self.control.lock();

        if !self.state.transition(StreamState::Streaming, StreamState::Stopping) {
            self.reap(&mut control);
            if cancelled {
                log::info!("pending audio stream start cancelled");
                if let Some(report) = control.last_report.clone() {
                    return StopStatus::Stopped(report);
                }
            }
            log::info!("audio stream not running");
            return StopStatus::NotRunning;
        }

        let report = match control.worker.take() {
            Some(worker) => self.join_worker(worker),
            None => {
                log::warn!("streaming state without a capture thread");
                SessionReport::begin(self.config.window_size)
            }
        };
        self.state.set(StreamState::Idle);
        control.last_report = Some(report.clone());
        StopStatus::Stopped(report)
    }

    /// Collect a capture thread that ended on its own.
    ///
    /// Once the loop has put the state back to idle it only has teardown
    /// left, so joining it does not block for long.
    fn reap(&self, control: &mut Control) {
        let finished = control
            .worker
            .as_ref()
            .is_some_and(|worker| worker.is_finished() || self.state.get().is_idle());
        if !finished {
            return;
        }
        if let Some(worker) = control.worker.take() {
            let report = self.join_worker(worker);
            if report.is_error() {
                log::warn!("previous session ended with {:?}", report.outcome);
            }
            control.last_report = Some(report);
            // A thread that panicked outside its own handler left the state as is.
            if !self.state.get().is_idle() {
                self.state.set(StreamState::Idle);
            }
        }
    }

    fn join_worker(&self, worker: JoinHandle<SessionReport>) -> SessionReport {
        match worker.join() {
            Ok(report) => report,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("capture thread panicked: {}", message);
                let mut report = SessionReport::begin(self.config.window_size);
                report.outcome = SessionOutcome::Aborted(message);
                self.sink.on_session_finished(&report);
                report
            }
        }
    }
}

impl<D: AudioDevice> Drop for MicrophoneStreamer<D> {
    fn drop(&mut self) {
        if let StopStatus::Stopped(report) = self.stop() {
            log::info!("streamer dropped; session {} stopped", report.id);
        }
    }
}
