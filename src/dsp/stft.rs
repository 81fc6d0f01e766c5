//! Short-time Fourier transform with centred, zero-padded frames.
//!
//! Frame `t` is centred on sample `t * hop`, so a signal of `n` samples
//! yields `n / hop + 1` frames. Every per-frame feature in the pipeline is
//! indexed the same way.

use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Window length used throughout the pipeline.
pub const N_FFT: usize = 2048;

/// Number of centred frames for `len` samples.
pub fn frame_count(len: usize, hop: usize) -> usize {
    len / hop + 1
}

/// Time in seconds of the centre of frame `index`.
pub fn frames_to_time(index: usize, hop: usize, sample_rate: u32) -> f64 {
    index as f64 * hop as f64 / sample_rate as f64
}

/// Centre frequency of every non-negative FFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}

/// Periodic Hann window (divides by N, not N-1), which overlap-adds to a
/// constant at hop = N/4.
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Magnitude spectrogram: `frames[t][k]` is the magnitude of bin `k` in frame `t`.
#[derive(Clone, Debug)]
pub struct Spectrogram {
    frames: Vec<Vec<f32>>,
    frequencies: Vec<f32>,
}

impl Spectrogram {
    pub fn new(frames: Vec<Vec<f32>>, frequencies: Vec<f32>) -> Self {
        Self {
            frames,
            frequencies,
        }
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }
}

/// Forward/inverse STFT sharing one pair of FFT plans across workers.
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            n_fft,
            hop,
            window: hann_window(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    /// Complex spectra of the non-negative bins, one vector per frame.
    pub fn forward(&self, samples: &[f32]) -> Vec<Vec<Complex<f32>>> {
        let n_frames = frame_count(samples.len(), self.hop);
        let half = self.n_fft / 2;

        (0..n_frames)
            .into_par_iter()
            .map(|t| {
                let start = (t * self.hop) as isize - half as isize;
                let mut buffer: Vec<Complex<f32>> = (0..self.n_fft)
                    .map(|i| {
                        let idx = start + i as isize;
                        let s = if idx >= 0 && (idx as usize) < samples.len() {
                            samples[idx as usize]
                        } else {
                            0.0
                        };
                        Complex::new(s * self.window[i], 0.0)
                    })
                    .collect();
                self.forward.process(&mut buffer);
                buffer.truncate(half + 1);
                buffer
            })
            .collect()
    }

    /// Magnitude spectrogram with bin frequencies for `sample_rate`.
    pub fn magnitude(&self, samples: &[f32], sample_rate: u32) -> Spectrogram {
        let frames = self
            .forward(samples)
            .into_par_iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect();
        Spectrogram::new(frames, fft_frequencies(sample_rate, self.n_fft))
    }

    /// Inverse transform by windowed overlap-add, trimmed to `length` samples.
    pub fn inverse(&self, frames: &[Vec<Complex<f32>>], length: usize) -> Vec<f32> {
        let half = self.n_fft / 2;
        let padded_len = (frames.len().saturating_sub(1)) * self.hop + self.n_fft;

        let segments: Vec<Vec<f32>> = frames
            .par_iter()
            .map(|frame| {
                let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];
                for (k, value) in frame.iter().enumerate().take(half + 1) {
                    buffer[k] = *value;
                    if k > 0 && k < half {
                        buffer[self.n_fft - k] = value.conj();
                    }
                }
                self.inverse.process(&mut buffer);
                let scale = 1.0 / self.n_fft as f32;
                buffer
                    .iter()
                    .zip(&self.window)
                    .map(|(c, w)| c.re * scale * w)
                    .collect()
            })
            .collect();

        let mut output = vec![0.0f32; padded_len];
        let mut norm = vec![0.0f32; padded_len];
        for (t, segment) in segments.iter().enumerate() {
            let offset = t * self.hop;
            for (i, (&s, &w)) in segment.iter().zip(&self.window).enumerate() {
                output[offset + i] += s;
                norm[offset + i] += w * w;
            }
        }

        (0..length)
            .map(|i| {
                let idx = i + half;
                if idx < padded_len && norm[idx] > f32::MIN_POSITIVE {
                    output[idx] / norm[idx]
                } else {
                    0.0
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn frame_count_matches_centred_framing() {
        assert_eq!(frame_count(5 * 22050, 512), 216);
        assert_eq!(frame_count(0, 512), 1);
        assert_eq!(frame_count(511, 512), 1);
        assert_eq!(frame_count(512, 512), 2);

        let stft = Stft::new(N_FFT, 512);
        let spec = stft.magnitude(&vec![0.0; 3000], 22050);
        assert_eq!(spec.n_frames(), frame_count(3000, 512));
        assert_eq!(spec.frequencies().len(), N_FFT / 2 + 1);
    }

    #[test]
    fn frame_times() {
        assert_eq!(frames_to_time(0, 512, 22050), 0.0);
        assert!((frames_to_time(43, 512, 22050) - 0.998458).abs() < 1e-5);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let sr = 22050;
        let stft = Stft::new(N_FFT, 512);
        let spec = stft.magnitude(&sine(1000.0, sr, sr as usize), sr);
        let frame = &spec.frames()[spec.n_frames() / 2];
        let peak = frame
            .iter()
            .enumerate()
            .fold((0, 0.0f32), |acc, (k, &m)| if m > acc.1 { (k, m) } else { acc })
            .0;
        let peak_hz = spec.frequencies()[peak];
        assert!((peak_hz - 1000.0).abs() < sr as f32 / N_FFT as f32);
    }

    #[test]
    fn silence_has_zero_magnitude() {
        let stft = Stft::new(N_FFT, 512);
        let spec = stft.magnitude(&vec![0.0; 4096], 22050);
        assert!(spec.frames().iter().flatten().all(|&m| m == 0.0));
    }

    #[test]
    fn inverse_reconstructs_signal() {
        let sr = 22050;
        let signal = sine(330.0, sr, 10_000);
        let stft = Stft::new(N_FFT, 512);
        let frames = stft.forward(&signal);
        let rebuilt = stft.inverse(&frames, signal.len());
        assert_eq!(rebuilt.len(), signal.len());
        let max_err = signal
            .iter()
            .zip(&rebuilt)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-3, "max reconstruction error {}", max_err);
    }

    #[test]
    fn hann_is_periodic() {
        let w = hann_window(4);
        assert_eq!(w[0], 0.0);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert!((w[1] - 0.5).abs() < 1e-6);
    }
}
