//! # spectrum-stream-core
//!
//! Platform-agnostic core of the microphone spectrum streamer.
//!
//! Reads fixed-size frames from an input device, turns each one into a
//! magnitude spectrum in dB, smooths it with a moving average and forwards
//! the result to a sink at a bounded rate. Platform backends implement the
//! `AudioDevice` trait and plug into the generic `MicrophoneStreamer`.
//!
//! ## Architecture
//!
//! ```text
//! spectrum-stream-core (this crate)
//! ├── traits/       ← AudioDevice, DeviceHandle, TransportSink
//! ├── models/       ← StreamError, StreamState, CaptureConfig, SpectralFrame, SessionReport
//! ├── processing/   ← SpectralAverager, FftProcessor, RateGate, RingBuffer, PCM helpers
//! ├── session/      ← MicrophoneStreamer (lifecycle) and the capture loop
//! └── transport/    ← ChannelSink
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod traits;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{CaptureConfig, StreamOverrides};
pub use models::device_info::DeviceInfo;
pub use models::error::{DeviceError, StreamError};
pub use models::session_report::{SessionReport, StreamDiagnostics};
pub use models::spectrum::{RawFrame, SpectralFrame};
pub use models::state::{SessionOutcome, StreamState};
pub use processing::averager::{SpectralAverager, SILENCE_FLOOR_DB};
pub use processing::rate_gate::RateGate;
pub use processing::ring_buffer::RingBuffer;
pub use session::streamer::{MicrophoneStreamer, StartStatus, StopStatus};
pub use traits::audio_device::{AudioDevice, DeviceHandle};
pub use traits::transport_sink::TransportSink;
pub use transport::channel_sink::{ChannelSink, SinkEvent, SinkReceiver};
