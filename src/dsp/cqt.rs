//! Constant-Q magnitude transform.
//!
//! Each bin correlates the signal with a Hann-windowed complex exponential
//! whose length spans a fixed number of cycles. Lower octaves run on a
//! half-band decimated copy of the signal so kernels stay short; an octave
//! is only decimated as far as the hop divides evenly and its top frequency
//! stays clear of the reduced Nyquist.

use rayon::prelude::*;

use super::stft::frame_count;

const HALFBAND_RADIUS: isize = 16;
/// Highest usable fraction of the sample rate at each decimation level.
const NYQUIST_MARGIN: f32 = 0.45;

struct Kernel {
    re: Vec<f32>,
    im: Vec<f32>,
}

impl Kernel {
    fn new(freq: f32, rate: f32, q: f32) -> Self {
        let len = ((q * rate / freq).ceil() as usize).max(1);
        let window: Vec<f32> = if len == 1 {
            vec![1.0]
        } else {
            (0..len)
                .map(|n| {
                    0.5 - 0.5 * (2.0 * std::f32::consts::PI * n as f32 / (len - 1) as f32).cos()
                })
                .collect()
        };
        // A unit sinusoid correlates to half the window sum.
        let gain = 0.5 * window.iter().sum::<f32>();
        let half = (len / 2) as f32;
        let (re, im) = window
            .iter()
            .enumerate()
            .map(|(n, w)| {
                let phase = 2.0 * std::f32::consts::PI * freq * (n as f32 - half) / rate;
                (w * phase.cos() / gain, -w * phase.sin() / gain)
            })
            .unzip();
        Self { re, im }
    }

    fn len(&self) -> usize {
        self.re.len()
    }

    /// Magnitude of the correlation centred on `center`.
    fn response(&self, signal: &[f32], center: usize) -> f32 {
        let start = center as isize - (self.len() / 2) as isize;
        let mut acc_re = 0.0f32;
        let mut acc_im = 0.0f32;
        for (n, (kr, ki)) in self.re.iter().zip(&self.im).enumerate() {
            let idx = start + n as isize;
            if idx < 0 {
                continue;
            }
            let Some(&s) = signal.get(idx as usize) else {
                break;
            };
            acc_re += s * kr;
            acc_im += s * ki;
        }
        (acc_re * acc_re + acc_im * acc_im).sqrt()
    }
}

struct OctavePlan {
    level: u32,
    /// `None` for bins above the usable band at this level.
    kernels: Vec<Option<Kernel>>,
}

pub struct ConstantQ {
    hop: usize,
    fmin: f32,
    bins_per_octave: usize,
    octaves: Vec<OctavePlan>,
}

impl ConstantQ {
    pub fn new(
        sample_rate: u32,
        hop: usize,
        fmin: f32,
        n_octaves: usize,
        bins_per_octave: usize,
    ) -> Self {
        let q = 1.0 / (2f32.powf(1.0 / bins_per_octave as f32) - 1.0);
        let max_level = hop.trailing_zeros().min(n_octaves.saturating_sub(1) as u32);
        let sr = sample_rate as f32;

        let octaves = (0..n_octaves)
            .map(|octave| {
                let octave_top = fmin * 2f32.powi(octave as i32 + 1);
                let mut level = ((n_octaves - 1 - octave) as u32).min(max_level);
                while level > 0 && octave_top >= NYQUIST_MARGIN * sr / (1u32 << level) as f32 {
                    level -= 1;
                }
                let rate = sr / (1u32 << level) as f32;
                let kernels = (0..bins_per_octave)
                    .map(|b| {
                        let k = octave * bins_per_octave + b;
                        let freq = fmin * 2f32.powf(k as f32 / bins_per_octave as f32);
                        (freq < 0.5 * rate).then(|| Kernel::new(freq, rate, q))
                    })
                    .collect();
                OctavePlan { level, kernels }
            })
            .collect::<Vec<_>>();

        log::debug!(
            "CQT: {} octaves x {} bins from {:.2}Hz, decimation levels {:?}",
            n_octaves,
            bins_per_octave,
            fmin,
            octaves.iter().map(|o| o.level).collect::<Vec<_>>()
        );

        Self {
            hop,
            fmin,
            bins_per_octave,
            octaves,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.octaves.len() * self.bins_per_octave
    }

    pub fn bins_per_octave(&self) -> usize {
        self.bins_per_octave
    }

    pub fn fmin(&self) -> f32 {
        self.fmin
    }

    /// Magnitudes, one vector of `n_bins()` per centred frame.
    pub fn magnitude(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let n_frames = frame_count(samples.len(), self.hop);
        let max_level = self.octaves.iter().map(|o| o.level).max().unwrap_or(0);

        let mut levels = vec![samples.to_vec()];
        for _ in 0..max_level {
            let next = levels.last().map(|x| decimate(x)).unwrap_or_default();
            levels.push(next);
        }

        (0..n_frames)
            .into_par_iter()
            .map(|t| {
                let mut frame = Vec::with_capacity(self.n_bins());
                for octave in &self.octaves {
                    let signal = &levels[octave.level as usize];
                    let center = t * (self.hop >> octave.level);
                    frame.extend(octave.kernels.iter().map(|kernel| {
                        kernel
                            .as_ref()
                            .map_or(0.0, |k| k.response(signal, center))
                    }));
                }
                frame
            })
            .collect()
    }
}

fn halfband_taps() -> Vec<f32> {
    let taps: Vec<f32> = (-HALFBAND_RADIUS..=HALFBAND_RADIUS)
        .map(|k| {
            let ideal = if k == 0 {
                0.5
            } else {
                let x = std::f32::consts::PI * k as f32;
                (x / 2.0).sin() / x
            };
            let window = 0.5
                + 0.5 * (std::f32::consts::PI * k as f32 / (HALFBAND_RADIUS + 1) as f32).cos();
            ideal * window
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

/// Low-pass at a quarter of the sample rate, then keep every other sample.
/// Output sample `m` is aligned with input sample `2m`.
pub fn decimate(signal: &[f32]) -> Vec<f32> {
    let taps = halfband_taps();
    let out_len = signal.len().div_ceil(2);
    (0..out_len)
        .map(|m| {
            let center = (2 * m) as isize;
            taps.iter()
                .enumerate()
                .filter_map(|(j, &h)| {
                    let idx = center + j as isize - HALFBAND_RADIUS;
                    (idx >= 0)
                        .then(|| signal.get(idx as usize).map(|&s| s * h))
                        .flatten()
                })
                .sum()
        })
        .collect()
}
