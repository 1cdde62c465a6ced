//! Test doubles shared by the unit tests of this crate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::CaptureConfig;
use crate::models::device_info::DeviceInfo;
use crate::models::error::DeviceError;
use crate::models::session_report::SessionReport;
use crate::models::spectrum::{RawFrame, SpectralFrame};
use crate::models::state::StreamState;
use crate::traits::audio_device::{AudioDevice, DeviceHandle};
use crate::traits::transport_sink::TransportSink;

const AMPLITUDE: f64 = 16000.0;

/// `count` consecutive frames of a continuous sine.
pub(crate) fn sine_frames(freq: f32, sample_rate: u32, window_size: usize, count: usize) -> Vec<RawFrame> {
    (0..count)
        .map(|n| RawFrame::new(sine_window(freq, sample_rate, window_size, n * window_size)))
        .collect()
}

fn sine_window(freq: f32, sample_rate: u32, window_size: usize, offset: usize) -> Vec<i16> {
    (0..window_size)
        .map(|i| {
            let t = (offset + i) as f64 / sample_rate as f64;
            (AMPLITUDE * (2.0 * std::f64::consts::PI * freq as f64 * t).sin()) as i16
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Signal {
    Silence,
    Sine(f32),
}

/// Behavior of a [`MockDevice`].
#[derive(Debug, Clone)]
pub(crate) struct MockScript {
    /// The first `open_failures` calls to `open` fail.
    pub open_failures: u32,
    /// Reads fail once this many frames were delivered by one handle.
    pub fail_read_after: Option<u64>,
    /// Sleep per read, standing in for the frame duration.
    pub read_delay: Duration,
    pub native_rate: u32,
    pub signal: Signal,
    /// Deliver frames of this length instead of the requested one.
    pub frame_len_override: Option<usize>,
    /// Reads panic once this many frames were delivered by one handle.
    pub panic_on_read_after: Option<u64>,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            open_failures: 0,
            fail_read_after: None,
            read_delay: Duration::from_millis(2),
            native_rate: 16000,
            signal: Signal::Silence,
            frame_len_override: None,
            panic_on_read_after: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    open_attempts: AtomicU32,
    opened: AtomicU32,
    stopped: AtomicU32,
    closed: AtomicU32,
}

/// Scripted device that counts every open and close.
#[derive(Clone)]
pub(crate) struct MockDevice {
    script: MockScript,
    counters: Arc<Counters>,
}

impl MockDevice {
    pub fn new(script: MockScript) -> Self {
        Self {
            script,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn open_attempts(&self) -> u32 {
        self.counters.open_attempts.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> u32 {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> u32 {
        self.counters.stopped.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u32 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Whether a handle is currently held open.
    pub fn is_open(&self) -> bool {
        self.opened() != self.closed()
    }
}

impl AudioDevice for MockDevice {
    type Handle = MockHandle;

    fn open(&self, config: &CaptureConfig) -> Result<MockHandle, DeviceError> {
        let attempt = self.counters.open_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.script.open_failures {
            return Err(DeviceError::Open(format!("mock open failure #{attempt}")));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockHandle {
            script: self.script.clone(),
            counters: Arc::clone(&self.counters),
            sample_rate: config.sample_rate.unwrap_or(self.script.native_rate),
            frames_read: 0,
        })
    }

    fn describe(&self) -> DeviceInfo {
        DeviceInfo {
            name: "mock microphone".into(),
            is_default: true,
            default_sample_rate: Some(self.script.native_rate),
            channels: 1,
        }
    }
}

pub(crate) struct MockHandle {
    script: MockScript,
    counters: Arc<Counters>,
    sample_rate: u32,
    frames_read: u64,
}

impl DeviceHandle for MockHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, window_size: usize) -> Result<RawFrame, DeviceError> {
        thread::sleep(self.script.read_delay);
        if let Some(limit) = self.script.fail_read_after {
            if self.frames_read >= limit {
                return Err(DeviceError::Read("mock read failure".into()));
            }
        }
        if let Some(limit) = self.script.panic_on_read_after {
            if self.frames_read >= limit {
                panic!("mock read panic");
            }
        }
        let len = self.script.frame_len_override.unwrap_or(window_size);
        let samples = match self.script.signal {
            Signal::Silence => vec![0; len],
            Signal::Sine(freq) => {
                sine_window(freq, self.sample_rate, len, self.frames_read as usize * len)
            }
        };
        self.frames_read += 1;
        Ok(RawFrame::new(samples))
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.counters.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(self) -> Result<(), DeviceError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that keeps everything it is given.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub frames: Mutex<Vec<SpectralFrame>>,
    pub errors: Mutex<Vec<String>>,
    pub states: Mutex<Vec<StreamState>>,
    pub reports: Mutex<Vec<SessionReport>>,
}

impl RecordingSink {
    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }
}

impl TransportSink for RecordingSink {
    fn emit(&self, frame: SpectralFrame) {
        self.frames.lock().push(frame);
    }

    fn emit_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn on_state_changed(&self, state: StreamState) {
        self.states.lock().push(state);
    }

    fn on_session_finished(&self, report: &SessionReport) {
        self.reports.lock().push(report.clone());
    }
}
