use crate::dsp::stft::{frame_count, N_FFT};

/// Root-mean-square energy of centred, zero-padded frames of `N_FFT` samples.
///
/// Uses a running sum of squares, so the cost is linear in the signal length
/// regardless of hop.
pub fn rms(samples: &[f32], hop: usize) -> Vec<f32> {
    let n_frames = frame_count(samples.len(), hop);
    let half = N_FFT / 2;

    let mut prefix = Vec::with_capacity(samples.len() + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0f64;
    for &s in samples {
        acc += s as f64 * s as f64;
        prefix.push(acc);
    }

    (0..n_frames)
        .map(|t| {
            let center = t * hop;
            let start = center.saturating_sub(half).min(samples.len());
            let end = (center + half).min(samples.len());
            let energy = (prefix[end] - prefix[start]).max(0.0);
            (energy / N_FFT as f64).sqrt() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_and_silence() {
        let out = rms(&vec![0.0; 5 * 22050], 512);
        assert_eq!(out.len(), 216);
        assert!(out.iter().all(|&v| v == 0.0));
        assert_eq!(rms(&[], 512), vec![0.0]);
    }

    #[test]
    fn constant_signal_interior_and_edges() {
        let out = rms(&vec![0.5; 8192], 512);
        // Interior frames see a full window.
        assert!((out[8] - 0.5).abs() < 1e-6);
        // The first frame is half zero padding.
        assert!((out[0] - 0.5 * 0.5f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn sine_rms() {
        let sr = 22050;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 441.0 * i as f32 / sr as f32).sin())
            .collect();
        let out = rms(&samples, 512);
        let mid = out[out.len() / 2];
        assert!((mid - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01);
    }
}
