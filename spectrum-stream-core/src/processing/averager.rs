use std::collections::VecDeque;

use crate::models::error::StreamError;
use crate::models::spectrum::{RawFrame, SpectralFrame};
use crate::processing::fft::FftProcessor;

/// Level reported for bins with no measurable energy.
///
/// A zero magnitude has no logarithm; such bins (and anything that would
/// compute below this value) are pinned here instead of going to -inf.
pub const SILENCE_FLOOR_DB: f32 = -120.0;

/// Convert one FFT magnitude to dB relative to a full-scale sine.
///
/// `20 * log10(2 * |m| / half_window)`, floored at [`SILENCE_FLOOR_DB`].
pub fn magnitude_to_db(magnitude: f32, half_window: f32) -> f32 {
    if !magnitude.is_finite() || magnitude <= 0.0 {
        return SILENCE_FLOOR_DB;
    }
    let db = 20.0 * (2.0 * magnitude / half_window).log10();
    if db.is_finite() {
        db.max(SILENCE_FLOOR_DB)
    } else {
        SILENCE_FLOOR_DB
    }
}

/// Bounded history of per-frame dB vectors.
///
/// Holds at most `depth` entries; pushing onto a full window evicts the
/// oldest one.
#[derive(Debug, Clone)]
pub struct AveragingWindow {
    depth: usize,
    frames: VecDeque<Vec<f32>>,
}

impl AveragingWindow {
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            depth,
            frames: VecDeque::with_capacity(depth),
        }
    }

    pub fn push(&mut self, levels: Vec<f32>) {
        if self.frames.len() == self.depth {
            self.frames.pop_front();
        }
        self.frames.push_back(levels);
    }

    /// Per-bin arithmetic mean over the frames currently held.
    ///
    /// During warm-up this averages fewer than `depth` frames.
    pub fn mean(&self) -> Vec<f32> {
        let Some(first) = self.frames.front() else {
            return Vec::new();
        };

        let mut sums = vec![0.0f32; first.len()];
        for frame in &self.frames {
            for (sum, &level) in sums.iter_mut().zip(frame) {
                *sum += level;
            }
        }
        let count = self.frames.len() as f32;
        sums.iter_mut().for_each(|sum| *sum /= count);
        sums
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Turns raw frames into moving-average magnitude spectra.
///
/// Keeps bins `1 ..= window_size/2 - 1`: the DC bin and the mirrored upper
/// half are dropped.
pub struct SpectralAverager {
    window_size: usize,
    include_samples: bool,
    fft: FftProcessor,
    history: AveragingWindow,
    freqs: Vec<f32>,
}

impl SpectralAverager {
    pub fn new(sample_rate: u32, window_size: usize, filter_depth: usize) -> Self {
        let half = window_size / 2;
        let freqs = (1..half)
            .map(|bin| sample_rate as f32 * bin as f32 / window_size as f32)
            .collect();

        Self {
            window_size,
            include_samples: false,
            fft: FftProcessor::new(window_size),
            history: AveragingWindow::new(filter_depth),
            freqs,
        }
    }

    /// Attach the raw samples to every produced spectrum.
    pub fn with_samples(mut self, include_samples: bool) -> Self {
        self.include_samples = include_samples;
        self
    }

    pub fn process(&mut self, frame: RawFrame) -> Result<SpectralFrame, StreamError> {
        if frame.len() != self.window_size {
            return Err(StreamError::InvalidFrame {
                expected: self.window_size,
                actual: frame.len(),
            });
        }

        let half = self.window_size / 2;
        let half_window = half as f32;
        let levels = self
            .fft
            .magnitudes(&frame.samples, 1..half)
            .into_iter()
            .map(|m| magnitude_to_db(m, half_window))
            .collect();
        self.history.push(levels);

        Ok(SpectralFrame {
            freqs: self.freqs.clone(),
            mags: self.history.mean(),
            samples: self.include_samples.then_some(frame.samples),
        })
    }

    /// Frames currently contributing to the average.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Drop the averaging history.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}
