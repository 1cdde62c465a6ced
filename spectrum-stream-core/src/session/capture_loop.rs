use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

use crate::models::config::CaptureConfig;
use crate::models::error::{DeviceError, StreamError};
use crate::models::session_report::{SessionReport, StreamDiagnostics};
use crate::models::spectrum::RawFrame;
use crate::models::state::{SessionOutcome, StreamState};
use crate::processing::averager::SpectralAverager;
use crate::processing::rate_gate::RateGate;
use crate::session::state_cell::StateCell;
use crate::traits::audio_device::{AudioDevice, DeviceHandle};
use crate::traits::transport_sink::TransportSink;

/// Outcome of the connect phase, reported back to `start`.
pub(crate) type ReadySignal = Sender<Result<(), StreamError>>;

/// An opened device that is stopped and closed when dropped.
///
/// Normal teardown goes through [`OpenDevice::release`]; the `Drop` impl
/// covers unwinding out of the streaming phase.
struct OpenDevice<H: DeviceHandle> {
    handle: Option<H>,
}

impl<H: DeviceHandle> OpenDevice<H> {
    fn new(handle: H) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn read(&mut self, window_size: usize) -> Result<RawFrame, DeviceError> {
        match self.handle.as_mut() {
            Some(handle) => handle.read(window_size),
            None => Err(DeviceError::Closed),
        }
    }

    fn release(&mut self) {
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        if let Err(e) = handle.stop() {
            log::warn!("failed to stop audio device: {}", e);
        }
        match handle.close() {
            Ok(()) => log::info!("audio stream closed"),
            Err(e) => log::error!("failed to close audio device: {}", e),
        }
    }
}

impl<H: DeviceHandle> Drop for OpenDevice<H> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Per-session streaming resources.
struct Session<H: DeviceHandle> {
    device: OpenDevice<H>,
    averager: SpectralAverager,
    gate: RateGate,
}

impl<H: DeviceHandle> Session<H> {
    fn close(mut self) {
        self.device.release();
        self.averager.reset();
        self.gate.reset();
    }
}

/// Capture loop state machine.
///
/// ```text
/// connecting ──ok──→ streaming ──→ closing
///     │ ↺ retry (fixed delay)
///     ├──retries spent──→ failed
///     └──stop requested──→ cancelled
/// ```
enum Phase<H: DeviceHandle> {
    Connecting { attempt: u32 },
    Streaming(Session<H>),
    Closing(Session<H>, SessionOutcome),
    Failed(StreamError),
    Cancelled,
}

/// Body of the capture thread for one session.
pub(crate) struct CaptureLoop<D: AudioDevice> {
    device: Arc<D>,
    config: CaptureConfig,
    sink: Arc<dyn TransportSink>,
    state: Arc<StateCell>,
    ready: Option<ReadySignal>,
}

impl<D: AudioDevice> CaptureLoop<D> {
    pub(crate) fn new(
        device: Arc<D>,
        config: CaptureConfig,
        sink: Arc<dyn TransportSink>,
        state: Arc<StateCell>,
        ready: ReadySignal,
    ) -> Self {
        Self {
            device,
            config,
            sink,
            state,
            ready: Some(ready),
        }
    }

    /// Run the session to completion and return its report.
    ///
    /// A panic anywhere in the session is caught here: the device guard has
    /// already closed the device while unwinding, and the session ends as
    /// `Aborted` with the state back at idle.
    pub(crate) fn run(mut self) -> SessionReport {
        let mut report = SessionReport::begin(self.config.window_size);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.drive(&mut report)));
        if let Err(panic) = result {
            let message = panic_message(panic.as_ref());
            log::error!("capture thread panicked: {}", message);
            self.sink
                .emit_error(&format!("Audio capture aborted: {}", message));
            report.outcome = SessionOutcome::Aborted(message.clone());
            self.state.set(StreamState::Idle);
            self.signal_ready(Err(StreamError::Unknown(format!(
                "capture thread panicked: {}",
                message
            ))));
        }

        self.sink.on_session_finished(&report);
        report
    }

    fn drive(&mut self, report: &mut SessionReport) {
        let mut phase = Phase::Connecting { attempt: 1 };

        loop {
            phase = match phase {
                Phase::Connecting { attempt } => self.connect(attempt, report),
                Phase::Streaming(mut session) => {
                    let outcome = self.stream(&mut session, &mut report.diagnostics);
                    Phase::Closing(session, outcome)
                }
                Phase::Closing(session, outcome) => {
                    session.close();
                    if outcome.is_error() {
                        // Ended on its own; a concurrent stop may already own the state.
                        self.state.transition(StreamState::Streaming, StreamState::Idle);
                    }
                    report.outcome = outcome;
                    break;
                }
                Phase::Failed(err) => {
                    log::error!("unable to start audio stream: {}", err);
                    self.sink.emit_error(&format!(
                        "Unable to start audio stream after {} attempt(s): {}",
                        report.diagnostics.open_attempts, err
                    ));
                    report.outcome = SessionOutcome::DeviceUnavailable(err.to_string());
                    // Starting, or Stopping if a stop raced the last attempt.
                    self.state.set(StreamState::Idle);
                    self.signal_ready(Err(err));
                    break;
                }
                Phase::Cancelled => {
                    log::info!("audio stream start cancelled");
                    report.outcome = SessionOutcome::Stopped;
                    self.state.set(StreamState::Idle);
                    self.signal_ready(Err(StreamError::Cancelled));
                    break;
                }
            };
        }
    }

    fn connect(&mut self, attempt: u32, report: &mut SessionReport) -> Phase<D::Handle> {
        if self.state.get() != StreamState::Starting {
            return Phase::Cancelled;
        }
        report.diagnostics.open_attempts = attempt;

        let handle = match self.device.open(&self.config) {
            Ok(handle) => handle,
            Err(err) => {
                log::error!("failed to open audio stream on attempt {}: {}", attempt, err);
                if attempt <= self.config.retries {
                    log::info!("retrying in {:.3} seconds", self.config.retry_delay.as_secs_f64());
                    let state = self
                        .state
                        .wait_while(StreamState::Starting, self.config.retry_delay);
                    if state != StreamState::Starting {
                        return Phase::Cancelled;
                    }
                    return Phase::Connecting {
                        attempt: attempt + 1,
                    };
                }
                log::error!("max retries reached; giving up on audio device");
                return Phase::Failed(StreamError::DeviceUnavailable {
                    attempts: attempt,
                    source: err,
                });
            }
        };

        let sample_rate = handle.sample_rate();
        let device = OpenDevice::new(handle);
        if sample_rate == 0 {
            // `device` drops here and is closed.
            return Phase::Failed(StreamError::DeviceUnavailable {
                attempts: attempt,
                source: DeviceError::Open("device reported a sample rate of 0 Hz".into()),
            });
        }
        report.sample_rate = Some(sample_rate);

        log::info!("audio stream started on attempt {}", attempt);
        log::info!(
            "sample rate: {} Hz | window size: {}",
            sample_rate,
            self.config.window_size
        );
        log::info!(
            "stream fps: {} | stream period: {:.3} s",
            self.config.stream_fps,
            self.config.stream_period().as_secs_f64()
        );

        let session = Session {
            device,
            averager: SpectralAverager::new(
                sample_rate,
                self.config.window_size,
                self.config.filter_depth,
            )
            .with_samples(self.config.include_samples),
            gate: RateGate::new(self.config.stream_period()),
        };

        if !self.state.transition(StreamState::Starting, StreamState::Streaming) {
            // Stopped while the last attempt was opening; `session` drops closed.
            return Phase::Cancelled;
        }
        self.signal_ready(Ok(()));
        Phase::Streaming(session)
    }

    fn stream(
        &self,
        session: &mut Session<D::Handle>,
        diagnostics: &mut StreamDiagnostics,
    ) -> SessionOutcome {
        let window_size = self.config.window_size;

        while self.state.get().is_streaming() {
            let frame = match session.device.read(window_size) {
                Ok(frame) => frame,
                Err(err) => {
                    log::error!("error reading audio data: {}", err);
                    let err = StreamError::ReadError(err);
                    self.sink.emit_error(&err.to_string());
                    return SessionOutcome::ReadFailed(err.to_string());
                }
            };
            diagnostics.frames_captured += 1;

            let spectrum = match session.averager.process(frame) {
                Ok(spectrum) => spectrum,
                Err(err) => {
                    log::error!("device delivered an unusable frame: {}", err);
                    self.sink.emit_error(&err.to_string());
                    return SessionOutcome::ReadFailed(err.to_string());
                }
            };

            if session.gate.admit(Instant::now()) {
                self.sink.emit(spectrum);
                diagnostics.frames_emitted += 1;
            } else {
                diagnostics.frames_throttled += 1;
            }
        }

        SessionOutcome::Stopped
    }

    fn signal_ready(&mut self, result: Result<(), StreamError>) {
        if let Some(ready) = self.ready.take() {
            // `start` may have given up waiting; nothing to do then.
            let _ = ready.send(result);
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
