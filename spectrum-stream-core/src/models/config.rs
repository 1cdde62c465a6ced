use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// Smallest window that still leaves one spectral bin after the DC and
/// Nyquist bins are dropped.
pub const MIN_WINDOW_SIZE: usize = 4;

/// Configuration for a spectrum streaming session.
///
/// Built once and treated as read-only afterwards. Per-session changes go
/// through [`StreamOverrides`], which produce a new validated copy.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Capture rate in Hz, or `None` for the device's native rate.
    pub sample_rate: Option<u32>,

    /// Samples per frame; also the FFT length (default: 2048).
    pub window_size: usize,

    /// Number of frames averaged by the spectral filter.
    pub filter_depth: usize,

    /// Maximum spectra forwarded per second.
    pub stream_fps: f64,

    /// Extra open attempts after the first failure (default: 3).
    pub retries: u32,

    /// Fixed wait between open attempts (default: 2 s).
    pub retry_delay: Duration,

    /// Forward the raw frame alongside each spectrum (default: true).
    pub include_samples: bool,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.sample_rate == Some(0) {
            return Err(StreamError::InvalidConfig("sample rate must be positive".into()));
        }
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(StreamError::InvalidConfig(format!(
                "window size must be at least {MIN_WINDOW_SIZE}, got {}",
                self.window_size
            )));
        }
        if self.filter_depth == 0 {
            return Err(StreamError::InvalidConfig("filter depth must be at least 1".into()));
        }
        if !self.stream_fps.is_finite() || self.stream_fps <= 0.0 {
            return Err(StreamError::InvalidConfig(format!(
                "stream fps must be positive, got {}",
                self.stream_fps
            )));
        }
        if Duration::try_from_secs_f64(1.0 / self.stream_fps).is_err() {
            return Err(StreamError::InvalidConfig(format!(
                "stream fps {} is too small",
                self.stream_fps
            )));
        }
        if !self.window_size.is_power_of_two() {
            log::warn!(
                "window size {} is not a power of two; FFT will be slower",
                self.window_size
            );
        }
        Ok(())
    }

    /// Time between two admitted emissions.
    pub fn stream_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.stream_fps)
    }

    /// Number of frequency bins in every emitted spectrum.
    pub fn bin_count(&self) -> usize {
        self.window_size / 2 - 1
    }

    /// Return a validated copy with the given overrides applied.
    pub fn with_overrides(&self, overrides: &StreamOverrides) -> Result<Self, StreamError> {
        let mut config = self.clone();
        if let Some(rate) = overrides.sample_rate {
            if rate == 0 {
                return Err(StreamError::InvalidConfig("sample rate override must be positive".into()));
            }
            config.sample_rate = Some(rate);
        }
        if let Some(size) = overrides.window_size {
            if size == 0 {
                return Err(StreamError::InvalidConfig("window size override must be positive".into()));
            }
            config.window_size = size;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load the `[Audio]` table of a TOML configuration file.
    pub fn load_from(path: &Path) -> Result<Self, StreamError> {
        let text = fs::read_to_string(path).map_err(|e| {
            StreamError::ConfigFile(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, StreamError> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| StreamError::ConfigFile(format!("failed to parse config: {}", e)))?;
        let config = Self::try_from(file.audio)?;
        Ok(config)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            window_size: 2048,
            filter_depth: 4,
            stream_fps: 10.0,
            retries: 3,
            retry_delay: Duration::from_secs(2),
            include_samples: true,
        }
    }
}

/// Per-session changes requested by `start`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOverrides {
    pub sample_rate: Option<u32>,
    pub window_size: Option<usize>,
}

impl StreamOverrides {
    pub fn is_empty(&self) -> bool {
        self.sample_rate.is_none() && self.window_size.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "Audio")]
    audio: AudioSection,
}

/// On-disk layout. `FilterSize` and `StreamFps` have no default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AudioSection {
    #[serde(default)]
    sample_rate: Option<u32>,
    #[serde(default = "default_window_size")]
    window_size: usize,
    filter_size: usize,
    stream_fps: f64,
    #[serde(default = "default_retries")]
    retries: u32,
    #[serde(default = "default_retry_delay")]
    retry_delay: f64,
    #[serde(default = "default_include_samples")]
    include_samples: bool,
}

fn default_window_size() -> usize {
    2048
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    2.0
}

fn default_include_samples() -> bool {
    true
}

impl TryFrom<AudioSection> for CaptureConfig {
    type Error = StreamError;

    fn try_from(section: AudioSection) -> Result<Self, Self::Error> {
        let retry_delay = Duration::try_from_secs_f64(section.retry_delay).map_err(|_| {
            StreamError::InvalidConfig(format!(
                "retry delay must be a non-negative number of seconds, got {}",
                section.retry_delay
            ))
        })?;
        let config = Self {
            sample_rate: section.sample_rate,
            window_size: section.window_size,
            filter_depth: section.filter_size,
            stream_fps: section.stream_fps,
            retries: section.retries,
            retry_delay,
            include_samples: section.include_samples,
        };
        config.validate()?;
        Ok(config)
    }
}
