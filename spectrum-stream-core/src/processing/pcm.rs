//! Sample conversion helpers for backends that deliver float or
//! multi-channel audio.

/// Downmix interleaved multi-channel audio to mono by averaging channels per frame.
///
/// A trailing partial frame is discarded.
pub fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Convert f32 samples `[-1.0, 1.0]` to 16-bit PCM values.
///
/// Clamps out-of-range values; NaN maps to silence.
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&sample| {
            if sample.is_nan() {
                return 0;
            }
            (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })
        .collect()
}
