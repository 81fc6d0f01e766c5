use crate::audio::features::PitchClassTable;
use crate::dsp::cqt::ConstantQ;

const N_OCTAVES: usize = 7;
const BINS_PER_OCTAVE: usize = 36;

/// Pitch class of each constant-Q bin. Bins are grouped in runs of
/// `bins_per_octave / 12` centred on each semitone, starting from the pitch
/// class of `fmin`.
fn bin_classes(n_bins: usize, bins_per_octave: usize, fmin: f32) -> Vec<usize> {
    let n_merge = bins_per_octave / 12;
    let midi = 69.0 + 12.0 * (fmin / 440.0).log2();
    let offset = (midi.round() as i64).rem_euclid(12) as usize;
    (0..n_bins)
        .map(|k| (offset + (k % bins_per_octave + n_merge / 2) / n_merge) % 12)
        .collect()
}

/// Constant-Q chromagram, one row of 12 pitch-class energies per frame,
/// each row scaled so its largest entry is 1 (silent rows stay 0).
pub fn chroma(
    samples: &[f32],
    sample_rate: u32,
    hop: usize,
    table: &PitchClassTable,
) -> Vec<[f32; 12]> {
    let cqt = ConstantQ::new(sample_rate, hop, table.reference_hz, N_OCTAVES, BINS_PER_OCTAVE);
    let classes = bin_classes(cqt.n_bins(), cqt.bins_per_octave(), cqt.fmin());

    cqt.magnitude(samples)
        .into_iter()
        .map(|frame| {
            let mut row = [0.0f32; 12];
            for (magnitude, &class) in frame.iter().zip(&classes) {
                row[class] += magnitude;
            }
            let max = row.iter().copied().fold(0.0f32, f32::max);
            if max > 0.0 {
                row.iter_mut().for_each(|v| *v /= max);
            }
            row
        })
        .collect()
}
