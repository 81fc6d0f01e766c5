use rayon::prelude::*;

use crate::dsp::mel;
use crate::dsp::stft::{frame_count, Stft, N_FFT};

const N_MELS: usize = 128;
const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Spectral-flux onset strength: positive frame-to-frame rise of the
/// log-power mel spectrogram, averaged over mel bands.
///
/// The envelope is shifted right by the difference lag plus half a window so
/// that a peak lines up with the frame whose centre sits on the attack.
/// Returns exactly `frame_count(samples.len(), hop)` values.
pub fn onset_strength(samples: &[f32], sample_rate: u32, hop: usize) -> Vec<f32> {
    let n_frames = frame_count(samples.len(), hop);
    let filters = mel::filterbank(sample_rate, N_FFT, N_MELS);

    let mel_db: Vec<Vec<f32>> = Stft::new(N_FFT, hop)
        .forward(samples)
        .par_iter()
        .map(|frame| {
            let power: Vec<f32> = frame.iter().map(|c| c.norm_sqr()).collect();
            mel::apply(&filters, &power)
                .into_iter()
                .map(|p| 10.0 * p.max(AMIN).log10())
                .collect()
        })
        .collect();

    let max = mel_db.iter().flatten().copied().fold(f32::MIN, f32::max);
    let floor = max - TOP_DB;

    let flux = mel_db.windows(2).map(|pair| {
        let rise: f32 = pair[1]
            .iter()
            .zip(&pair[0])
            .map(|(&now, &before)| (now.max(floor) - before.max(floor)).max(0.0))
            .sum();
        rise / N_MELS as f32
    });

    let pad = 1 + N_FFT / (2 * hop);
    let mut envelope: Vec<f32> = std::iter::repeat(0.0).take(pad).chain(flux).collect();
    envelope.resize(n_frames, 0.0);
    envelope
}
