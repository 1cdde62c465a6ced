// FFT wrapper - forward transform of one real-valued frame
//
// The plan and scratch space are built once per window size and reused for
// every frame of a session, so per-frame work is a copy plus the transform.

use std::ops::Range;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Forward FFT of fixed-length 16-bit frames.
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl FftProcessor {
    /// Plan a forward transform of `fft_size` points.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            fft_size,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Unnormalized magnitudes `|X[k]|` for every `k` in `bins`.
    ///
    /// `samples` shorter than the FFT size are zero-padded; extra samples
    /// are ignored. Callers validate frame length beforehand.
    pub fn magnitudes(&mut self, samples: &[i16], bins: Range<usize>) -> Vec<f32> {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0);
            *slot = Complex::new(sample as f32, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        self.buffer[bins].iter().map(|c| c.norm()).collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn constant_signal_lands_in_dc_bin() {
        let mut fft = FftProcessor::new(8);
        let mags = fft.magnitudes(&[100; 8], 0..4);

        assert_relative_eq!(mags[0], 800.0, epsilon = 1e-3);
        for &m in &mags[1..] {
            assert!(m.abs() < 1e-3);
        }
    }

    #[test]
    fn cosine_on_bin_center() {
        let n = 64;
        let k = 5;
        let samples: Vec<i16> = (0..n)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * k as f32 * i as f32 / n as f32;
                (1000.0 * phase.cos()).round() as i16
            })
            .collect();

        let mut fft = FftProcessor::new(n);
        let mags = fft.magnitudes(&samples, 0..n / 2);

        // A * N / 2 for a pure cosine of amplitude A
        assert_relative_eq!(mags[k], 32000.0, max_relative = 1e-3);
        assert!(mags[k - 1] < 50.0);
        assert!(mags[k + 1] < 50.0);
    }

    #[test]
    fn processor_is_reusable() {
        let mut fft = FftProcessor::new(16);
        let first = fft.magnitudes(&[50; 16], 0..8);
        let second = fft.magnitudes(&[50; 16], 0..8);
        assert_eq!(first, second);
    }
}
