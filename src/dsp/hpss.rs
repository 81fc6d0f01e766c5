//! Median-filtering harmonic/percussive separation.
//!
//! Harmonic energy is smooth along time within a bin; percussive energy is
//! smooth along frequency within a frame. Median filters in each direction
//! give two reference spectrograms, which become complementary soft masks
//! over the mixture.

use rayon::prelude::*;

use super::stft::{Stft, N_FFT};

/// Hop of the separation STFT. Independent of the analysis hop.
pub const HPSS_HOP: usize = N_FFT / 4;
/// Width of both median filters.
pub const KERNEL_SIZE: usize = 31;
/// Exponent of the soft masks.
const MASK_POWER: i32 = 2;

/// Harmonic and percussive signals, each as long as the input.
pub struct Separation {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

pub fn separate(samples: &[f32]) -> Separation {
    if samples.is_empty() {
        return Separation {
            harmonic: Vec::new(),
            percussive: Vec::new(),
        };
    }

    let stft = Stft::new(N_FFT, HPSS_HOP);
    let spectra = stft.forward(samples);
    let magnitude: Vec<Vec<f32>> = spectra
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect();

    let harmonic_ref = median_filter_time(&magnitude, KERNEL_SIZE);
    let percussive_ref = median_filter_freq(&magnitude, KERNEL_SIZE);

    let (harmonic_spectra, percussive_spectra): (Vec<_>, Vec<_>) = spectra
        .par_iter()
        .zip(harmonic_ref.par_iter().zip(percussive_ref.par_iter()))
        .map(|(frame, (h_ref, p_ref))| {
            let mut harmonic = Vec::with_capacity(frame.len());
            let mut percussive = Vec::with_capacity(frame.len());
            for ((value, &h), &p) in frame.iter().zip(h_ref).zip(p_ref) {
                let (mask_h, mask_p) = soft_masks(h, p);
                harmonic.push(*value * mask_h);
                percussive.push(*value * mask_p);
            }
            (harmonic, percussive)
        })
        .unzip();

    log::debug!(
        "HPSS: {} frames x {} bins, kernel {}",
        magnitude.len(),
        magnitude.first().map_or(0, Vec::len),
        KERNEL_SIZE
    );

    Separation {
        harmonic: stft.inverse(&harmonic_spectra, samples.len()),
        percussive: stft.inverse(&percussive_spectra, samples.len()),
    }
}

/// Complementary masks `(H^p / (H^p + P^p), P^p / (H^p + P^p))`.
///
/// Both masks are zero where neither reference carries energy.
fn soft_masks(harmonic: f32, percussive: f32) -> (f32, f32) {
    let z = harmonic.max(percussive);
    if z < f32::MIN_POSITIVE {
        return (0.0, 0.0);
    }
    let h = (harmonic / z).powi(MASK_POWER);
    let p = (percussive / z).powi(MASK_POWER);
    let total = h + p;
    (h / total, p / total)
}

/// Reflect `index` into `[0, len)` the way `d c b a | a b c d | d c b a` extends.
fn reflect(index: isize, len: usize) -> usize {
    let period = 2 * len as isize;
    let m = index.rem_euclid(period);
    if m >= len as isize {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}

fn median_of(window: &mut [f32]) -> f32 {
    let mid = window.len() / 2;
    let (_, median, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
    *median
}

/// Median over `kernel` neighbouring frames, per bin.
pub fn median_filter_time(frames: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    let n_frames = frames.len();
    let n_bins = frames.first().map_or(0, Vec::len);
    let radius = (kernel / 2) as isize;

    let columns: Vec<Vec<f32>> = (0..n_bins)
        .into_par_iter()
        .map(|k| {
            let mut window = vec![0.0f32; kernel];
            (0..n_frames)
                .map(|t| {
                    for (j, slot) in window.iter_mut().enumerate() {
                        let src = reflect(t as isize + j as isize - radius, n_frames);
                        *slot = frames[src][k];
                    }
                    median_of(&mut window)
                })
                .collect()
        })
        .collect();

    (0..n_frames)
        .map(|t| columns.iter().map(|column| column[t]).collect())
        .collect()
}

/// Median over `kernel` neighbouring bins, per frame.
pub fn median_filter_freq(frames: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    let radius = (kernel / 2) as isize;
    frames
        .par_iter()
        .map(|frame| {
            let n_bins = frame.len();
            let mut window = vec![0.0f32; kernel];
            (0..n_bins)
                .map(|k| {
                    for (j, slot) in window.iter_mut().enumerate() {
                        *slot = frame[reflect(k as isize + j as isize - radius, n_bins)];
                    }
                    median_of(&mut window)
                })
                .collect()
        })
        .collect()
}
