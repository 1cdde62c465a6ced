//! cpal microphone input.
//!
//! cpal delivers audio through a callback on its own thread. The callback
//! downmixes to mono 16-bit PCM and appends to a ring buffer; the capture
//! thread blocks in [`DeviceHandle::read`] until a full window is buffered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::{Condvar, Mutex};

use spectrum_stream_core::models::config::CaptureConfig;
use spectrum_stream_core::models::device_info::DeviceInfo;
use spectrum_stream_core::models::error::DeviceError;
use spectrum_stream_core::models::spectrum::RawFrame;
use spectrum_stream_core::processing::pcm::{downmix_to_mono, f32_to_i16};
use spectrum_stream_core::processing::ring_buffer::RingBuffer;
use spectrum_stream_core::traits::audio_device::{AudioDevice, DeviceHandle};

use crate::device_enumerator::{describe_device, find_input_device};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// A microphone reached through the cpal default host.
///
/// Only the device name is stored; the device itself is looked up again on
/// every `open`, so an unplugged and replugged microphone is picked up by
/// the next retry.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    device_name: Option<String>,
    read_timeout: Duration,
}

impl CpalMicrophone {
    /// The host's default input device.
    pub fn default_device() -> Self {
        Self {
            device_name: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// The input device with exactly this name.
    pub fn with_device(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// How long `read` waits for audio before reporting a read error.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::default_device()
    }
}

impl AudioDevice for CpalMicrophone {
    type Handle = CpalHandle;

    fn open(&self, config: &CaptureConfig) -> Result<CpalHandle, DeviceError> {
        let device = find_input_device(self.device_name.as_deref())?;
        let supported = select_config(&device, config.sample_rate)?;
        let sample_rate = supported.sample_rate().0;

        log::info!(
            "opening input device {}: {} Hz, {} channel(s), {:?}",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            sample_rate,
            supported.channels(),
            supported.sample_format()
        );

        let capacity = (config.window_size * 4).max(sample_rate as usize);
        let shared = Arc::new(Shared::new(capacity));
        let stream = build_stream(&device, &supported, Arc::clone(&shared))?;
        stream
            .play()
            .map_err(|e| DeviceError::Open(format!("failed to start input stream: {}", e)))?;

        Ok(CpalHandle {
            stream,
            shared,
            sample_rate,
            read_timeout: self.read_timeout,
            paused: false,
        })
    }

    fn describe(&self) -> DeviceInfo {
        let default_name = cpal::default_host()
            .default_input_device()
            .and_then(|d| d.name().ok());
        match find_input_device(self.device_name.as_deref()) {
            Ok(device) => describe_device(&device, default_name.as_deref()),
            Err(e) => {
                log::debug!("cannot describe input device: {}", e);
                DeviceInfo {
                    name: self.device_name.clone().unwrap_or_else(|| "default input".into()),
                    is_default: self.device_name.is_none(),
                    default_sample_rate: None,
                    channels: 0,
                }
            }
        }
    }
}

/// An open cpal input stream.
///
/// `cpal::Stream` is not `Send` on every platform; the handle stays on the
/// capture thread that opened it.
pub struct CpalHandle {
    stream: cpal::Stream,
    shared: Arc<Shared>,
    sample_rate: u32,
    read_timeout: Duration,
    paused: bool,
}

impl DeviceHandle for CpalHandle {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read(&mut self, window_size: usize) -> Result<RawFrame, DeviceError> {
        if self.paused {
            return Err(DeviceError::Closed);
        }
        let samples = self.shared.take_frame(window_size, self.read_timeout)?;
        Ok(RawFrame::new(samples))
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        if self.paused {
            return Ok(());
        }
        self.paused = true;
        self.stream
            .pause()
            .map_err(|e| DeviceError::Read(format!("failed to pause input stream: {}", e)))
    }

    fn close(self) -> Result<(), DeviceError> {
        let dropped = self.shared.dropped();
        if dropped > 0 {
            log::warn!("{} samples dropped because the reader fell behind", dropped);
        }
        drop(self.stream);
        Ok(())
    }
}

/// Pick a stream configuration, honoring a requested sample rate.
///
/// Without a request the device default is used. With one, the supported
/// range closest to the default layout (channels, then format) wins.
fn select_config(
    device: &cpal::Device,
    sample_rate: Option<u32>,
) -> Result<cpal::SupportedStreamConfig, DeviceError> {
    let default = device
        .default_input_config()
        .map_err(|e| DeviceError::Open(format!("failed to query default input config: {}", e)))?;

    let Some(rate) = sample_rate else {
        return Ok(default);
    };
    if default.sample_rate().0 == rate && is_supported_format(default.sample_format()) {
        return Ok(default);
    }

    let ranges = device
        .supported_input_configs()
        .map_err(|e| DeviceError::Open(format!("failed to query input configs: {}", e)))?;
    let mut candidates: Vec<_> = ranges
        .filter(|range| {
            range.min_sample_rate().0 <= rate
                && rate <= range.max_sample_rate().0
                && is_supported_format(range.sample_format())
        })
        .collect();
    candidates.sort_by_key(|range| {
        (
            range.channels() != default.channels(),
            range.sample_format() != default.sample_format(),
        )
    });

    candidates
        .into_iter()
        .next()
        .map(|range| range.with_sample_rate(cpal::SampleRate(rate)))
        .ok_or_else(|| DeviceError::Open(format!("sample rate {} Hz is not supported", rate)))
}

fn is_supported_format(format: cpal::SampleFormat) -> bool {
    matches!(format, cpal::SampleFormat::I16 | cpal::SampleFormat::F32)
}

fn build_stream(
    device: &cpal::Device,
    supported: &cpal::SupportedStreamConfig,
    shared: Arc<Shared>,
) -> Result<cpal::Stream, DeviceError> {
    let channels = supported.channels() as usize;
    let config: cpal::StreamConfig = supported.config();

    let error_shared = Arc::clone(&shared);
    let on_error = move |err: cpal::StreamError| {
        log::error!("cpal stream error: {}", err);
        error_shared.fail(err.to_string());
    };

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                shared.push(&downmix_to_mono(data, channels));
            },
            on_error,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                shared.push(&downmix_to_mono(&f32_to_i16(data), channels));
            },
            on_error,
            None,
        ),
        other => return Err(DeviceError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream.map_err(|e| DeviceError::Open(format!("failed to build input stream: {}", e)))
}

/// State written by the cpal callback and read by the capture thread.
struct Pending {
    samples: RingBuffer,
    failure: Option<String>,
}

struct Shared {
    pending: Mutex<Pending>,
    available: Condvar,
}

impl Shared {
    fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(Pending {
                samples: RingBuffer::new(capacity),
                failure: None,
            }),
            available: Condvar::new(),
        }
    }

    fn push(&self, samples: &[i16]) {
        self.pending.lock().samples.write(samples);
        self.available.notify_one();
    }

    /// Record a stream error; the next read reports it.
    fn fail(&self, message: String) {
        self.pending.lock().failure = Some(message);
        self.available.notify_all();
    }

    fn dropped(&self) -> u64 {
        self.pending.lock().samples.dropped()
    }

    /// Wait for `window_size` samples, a stream error, or the timeout.
    fn take_frame(&self, window_size: usize, timeout: Duration) -> Result<Vec<i16>, DeviceError> {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();

        if window_size > pending.samples.capacity() {
            return Err(DeviceError::Read(format!(
                "window of {} samples exceeds buffer capacity {}",
                window_size,
                pending.samples.capacity()
            )));
        }

        loop {
            if let Some(message) = pending.failure.take() {
                return Err(DeviceError::Read(message));
            }
            if let Some(samples) = pending.samples.read_exact(window_size) {
                return Ok(samples);
            }
            if Instant::now() >= deadline {
                return Err(DeviceError::Read(format!(
                    "no audio received within {} ms",
                    timeout.as_millis()
                )));
            }
            self.available.wait_until(&mut pending, deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn take_frame_returns_buffered_window() {
        let shared = Shared::new(16);
        shared.push(&[1, 2, 3, 4, 5]);

        assert_eq!(shared.take_frame(4, Duration::from_millis(10)), Ok(vec![1, 2, 3, 4]));
        assert_eq!(shared.pending.lock().samples.count(), 1);
    }

    #[test]
    fn take_frame_waits_for_callback() {
        let shared = Arc::new(Shared::new(64));
        let producer = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for chunk in [[1i16; 8], [2; 8], [3; 8], [4; 8]] {
                    thread::sleep(Duration::from_millis(5));
                    shared.push(&chunk);
                }
            })
        };

        let frame = shared.take_frame(32, Duration::from_secs(2)).unwrap();
        producer.join().unwrap();

        assert_eq!(frame.len(), 32);
        assert_eq!(&frame[..8], &[1; 8]);
        assert_eq!(&frame[24..], &[4; 8]);
    }

    #[test]
    fn take_frame_times_out_without_audio() {
        let shared = Shared::new(16);
        shared.push(&[1, 2]);

        let started = Instant::now();
        let result = shared.take_frame(8, Duration::from_millis(30));

        assert!(matches!(result, Err(DeviceError::Read(ref m)) if m.contains("no audio")));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn stream_error_surfaces_on_next_read() {
        let shared = Shared::new(16);
        shared.push(&[0; 16]);
        shared.fail("device unplugged".into());

        assert_eq!(
            shared.take_frame(8, Duration::from_millis(10)),
            Err(DeviceError::Read("device unplugged".into()))
        );
        // Reported once; buffered audio is still readable.
        assert!(shared.take_frame(8, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn oversized_window_is_rejected() {
        let shared = Shared::new(16);
        assert!(matches!(
            shared.take_frame(32, Duration::from_millis(10)),
            Err(DeviceError::Read(_))
        ));
    }

    #[test]
    fn overflow_keeps_latest_audio_and_counts_drops() {
        let shared = Shared::new(4);
        shared.push(&[1, 2, 3, 4, 5, 6]);

        assert_eq!(shared.dropped(), 2);
        assert_eq!(shared.take_frame(4, Duration::from_millis(10)), Ok(vec![3, 4, 5, 6]));
    }

    #[test]
    fn named_device_keeps_name_and_timeout() {
        let mic = CpalMicrophone::with_device("USB Mic").with_read_timeout(Duration::from_millis(250));

        assert_eq!(mic.device_name.as_deref(), Some("USB Mic"));
        assert_eq!(mic.read_timeout, Duration::from_millis(250));
        assert_eq!(CpalMicrophone::default().device_name, None);
    }
}
