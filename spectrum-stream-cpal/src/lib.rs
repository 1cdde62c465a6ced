//! # spectrum-stream-cpal
//!
//! cpal input backend for spectrum-stream.
//!
//! Provides:
//! - `CpalMicrophone` — `AudioDevice` over any input device cpal can open
//! - `list_input_devices` — input device enumeration on the default host
//!
//! ## Usage
//! ```no_run
//! use std::sync::Arc;
//! use spectrum_stream_core::{CaptureConfig, ChannelSink, MicrophoneStreamer};
//! use spectrum_stream_cpal::CpalMicrophone;
//!
//! let (sink, events) = ChannelSink::bounded(64);
//! let streamer = MicrophoneStreamer::new(
//!     CpalMicrophone::default_device(),
//!     CaptureConfig::default(),
//!     Arc::new(sink),
//! )?;
//! streamer.start(None)?;
//! let _first = events.recv();
//! streamer.stop();
//! # Ok::<(), spectrum_stream_core::StreamError>(())
//! ```

pub mod cpal_input;
pub mod device_enumerator;

pub use cpal_input::{CpalHandle, CpalMicrophone};
pub use device_enumerator::list_input_devices;
