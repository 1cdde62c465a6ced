use std::time::Instant;

use serde::{Deserialize, Serialize};

/// One window of mono 16-bit samples as read from the device.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub samples: Vec<i16>,
    pub captured_at: Instant,
}

impl RawFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples,
            captured_at: Instant::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Smoothed magnitude spectrum of one frame.
///
/// `freqs[i]` (Hz) pairs with `mags[i]` (dB). `samples` carries the raw
/// frame when the session was configured to forward it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralFrame {
    pub freqs: Vec<f32>,
    pub mags: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<i16>>,
}

impl SpectralFrame {
    pub fn len(&self) -> usize {
        self.mags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mags.is_empty()
    }

    /// Frequency and level of the loudest bin.
    ///
    /// Bins missing from either vector are ignored.
    pub fn peak(&self) -> Option<(f32, f32)> {
        self.freqs
            .iter()
            .zip(&self.mags)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(&freq, &mag)| (freq, mag))
    }
}
