use thiserror::Error;

/// Failures reported by an audio input backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no input device available")]
    NoDevice,

    #[error("failed to open input device: {0}")]
    Open(String),

    #[error("failed to read from input device: {0}")]
    Read(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("device handle already closed")]
    Closed,
}

/// Errors surfaced by the spectrum streamer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    /// The device could not be opened after every retry was spent.
    #[error("audio device unavailable after {attempts} attempt(s): {source}")]
    DeviceUnavailable {
        attempts: u32,
        #[source]
        source: DeviceError,
    },

    /// A single read failed mid-stream; the session has ended.
    #[error("audio read failed: {0}")]
    ReadError(#[source] DeviceError),

    #[error("invalid frame: expected {expected} samples, got {actual}")]
    InvalidFrame { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration file error: {0}")]
    ConfigFile(String),

    /// `stop` was called while `start` was still connecting.
    #[error("start cancelled by stop")]
    Cancelled,

    #[error("unknown error: {0}")]
    Unknown(String),
}
