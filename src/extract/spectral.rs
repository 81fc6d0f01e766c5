use rayon::prelude::*;

use crate::audio::features::{BandDefinition, FeatureSeries};
use crate::dsp::stft::Spectrogram;

const CONTRAST_FMIN: f32 = 200.0;
const CONTRAST_BANDS: usize = 6;
const CONTRAST_QUANTILE: f32 = 0.02;
const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Magnitude-weighted mean frequency per frame, in Hz. Frames without
/// energy report 0.
pub fn centroid(spec: &Spectrogram) -> Vec<f32> {
    let freqs = spec.frequencies();
    spec.frames()
        .par_iter()
        .map(|frame| {
            let (weighted, total) = frame
                .iter()
                .zip(freqs)
                .fold((0.0f64, 0.0f64), |(w, t), (&m, &f)| {
                    (w + m as f64 * f as f64, t + m as f64)
                });
            if total < f32::MIN_POSITIVE as f64 {
                0.0
            } else {
                (weighted / total) as f32
            }
        })
        .collect()
}

/// Mean magnitude of the bins whose centre lies in each band, one series per
/// band in table order. A band with no bins yields an all-zero series.
pub fn band_energies(spec: &Spectrogram, bands: &[BandDefinition]) -> Vec<FeatureSeries> {
    bands
        .iter()
        .map(|band| {
            let bins: Vec<usize> = spec
                .frequencies()
                .iter()
                .enumerate()
                .filter(|(_, &f)| band.contains(f))
                .map(|(k, _)| k)
                .collect();

            let values = if bins.is_empty() {
                log::debug!("Band {} has no FFT bins at this resolution", band.name);
                vec![0.0; spec.n_frames()]
            } else {
                spec.frames()
                    .iter()
                    .map(|frame| bins.iter().map(|&k| frame[k]).sum::<f32>() / bins.len() as f32)
                    .collect()
            };
            FeatureSeries::new(band.name, values)
        })
        .collect()
}

/// Bins of one contrast sub-band and how many of them form the peak and
/// valley estimates.
struct ContrastBand {
    bins: Vec<usize>,
    quantile_len: usize,
}

/// Octave sub-bands `[0, 200], [200, 400], ... [6400, nyquist]`. Each band
/// above the first also borrows the bin just below its lower edge; all but
/// the last drop their top bin, which the next band owns.
fn contrast_bands(freqs: &[f32]) -> Vec<ContrastBand> {
    let mut edges = vec![0.0f32];
    edges.extend((0..=CONTRAST_BANDS).map(|k| CONTRAST_FMIN * 2f32.powi(k as i32)));

    edges
        .windows(2)
        .enumerate()
        .filter_map(|(k, pair)| {
            let (low, high) = (pair[0], pair[1]);
            let inside: Vec<usize> = freqs
                .iter()
                .enumerate()
                .filter(|(_, &f)| f >= low && f <= high)
                .map(|(i, _)| i)
                .collect();
            let first = *inside.first()?;
            let mut last = *inside.last()?;
            let first = if k > 0 { first.saturating_sub(1) } else { first };
            if k == CONTRAST_BANDS {
                last = freqs.len() - 1;
            }
            let member_count = last - first + 1;
            let last_kept = if k < CONTRAST_BANDS { last.checked_sub(1)? } else { last };
            if last_kept < first {
                return None;
            }
            let quantile_len = ((CONTRAST_QUANTILE * member_count as f32).round() as usize).max(1);
            Some(ContrastBand {
                bins: (first..=last_kept).collect(),
                quantile_len,
            })
        })
        .collect()
}

fn to_db(values: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let db: Vec<Vec<f32>> = values
        .iter()
        .map(|row| row.iter().map(|&v| 10.0 * v.max(AMIN).log10()).collect())
        .collect();
    let max = db.iter().flatten().copied().fold(f32::MIN, f32::max);
    let floor = max - TOP_DB;
    db.into_iter()
        .map(|row| row.into_iter().map(|v| v.max(floor)).collect())
        .collect()
}

/// Peak-to-valley contrast in dB per octave sub-band, averaged over the
/// sub-bands that contain bins.
pub fn contrast(spec: &Spectrogram) -> Vec<f32> {
    let bands = contrast_bands(spec.frequencies());
    if bands.is_empty() {
        return vec![0.0; spec.n_frames()];
    }

    // Rows are frames, columns are sub-bands.
    let (peaks, valleys): (Vec<Vec<f32>>, Vec<Vec<f32>>) = spec
        .frames()
        .par_iter()
        .map(|frame| {
            bands
                .iter()
                .map(|band| {
                    let mut sorted: Vec<f32> = band.bins.iter().map(|&k| frame[k]).collect();
                    sorted.sort_unstable_by(f32::total_cmp);
                    let q = band.quantile_len.min(sorted.len());
                    let valley = sorted[..q].iter().sum::<f32>() / q as f32;
                    let peak = sorted[sorted.len() - q..].iter().sum::<f32>() / q as f32;
                    (peak, valley)
                })
                .unzip()
        })
        .unzip();

    let peak_db = to_db(&peaks);
    let valley_db = to_db(&valleys);

    peak_db
        .iter()
        .zip(&valley_db)
        .map(|(p, v)| p.iter().zip(v).map(|(p, v)| p - v).sum::<f32>() / bands.len() as f32)
        .collect()
}
