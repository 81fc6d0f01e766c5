//! Global tempo estimation and dynamic-programming beat tracking over an
//! onset-strength envelope.
//!
//! Tempo comes from an autocorrelation tempogram weighted by a log-normal
//! prior around 120 BPM. Beats are the sequence of frames that maximises
//! accumulated onset strength while keeping inter-beat intervals close to
//! the tempo period (Ellis, 2007).

use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::features::BeatTrack;
use crate::dsp::stft::{frames_to_time, hann_window};

/// Reported when the envelope carries no periodicity at all.
pub const DEFAULT_TEMPO: f32 = 120.0;

const TEMPOGRAM_WINDOW: usize = 384;
const TEMPOGRAM_FFT: usize = 1024;
const PRIOR_BPM: f32 = 120.0;
const MAX_TEMPO: f32 = 320.0;
const TIGHTNESS: f64 = 100.0;

/// Outcome of tempo estimation before it is collapsed to one value.
#[derive(Clone, Debug, PartialEq)]
pub enum TempoEstimate {
    Single(f32),
    /// Tied best candidates, strongest (shortest period) first.
    Candidates(Vec<f32>),
    Undetermined,
}

impl TempoEstimate {
    /// The tempo to report, taking the first of several candidates.
    pub fn resolve(&self) -> Option<f32> {
        match self {
            TempoEstimate::Single(bpm) => Some(*bpm),
            TempoEstimate::Candidates(bpms) => bpms.first().copied(),
            TempoEstimate::Undetermined => None,
        }
    }
}

pub struct BeatTracker {
    sample_rate: u32,
    hop_length: usize,
}

impl BeatTracker {
    pub fn new(sample_rate: u32, hop_length: usize) -> Self {
        Self {
            sample_rate,
            hop_length,
        }
    }

    fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_length as f32
    }

    /// Tempo and beat positions for an onset envelope sampled once per frame.
    pub fn track(&self, onset: &[f32]) -> BeatTrack {
        let tempo = self.estimate_tempo(onset).resolve();
        let Some(tempo) = tempo.filter(|t| *t > 0.0) else {
            log::debug!("No tempo candidate, falling back to {} BPM", DEFAULT_TEMPO);
            return self.no_beats();
        };

        let beat_frames = self.track_beats(onset, tempo);
        log::debug!("Tempo {:.2} BPM, {} beats", tempo, beat_frames.len());

        let beat_times = beat_frames
            .iter()
            .map(|&frame| frames_to_time(frame, self.hop_length, self.sample_rate))
            .collect();
        BeatTrack {
            tempo,
            beat_frames,
            beat_times,
        }
    }

    fn no_beats(&self) -> BeatTrack {
        BeatTrack {
            tempo: DEFAULT_TEMPO,
            beat_frames: Vec::new(),
            beat_times: Vec::new(),
        }
    }

    pub fn estimate_tempo(&self, onset: &[f32]) -> TempoEstimate {
        if onset.iter().all(|&v| v <= 0.0) {
            return TempoEstimate::Undetermined;
        }

        let profile = mean_tempogram(onset);
        let fps = self.frame_rate();

        let scored: Vec<(usize, f32, f32)> = candidate_lags(fps, profile.len())
            .into_iter()
            .map(|(lag, bpm)| {
                let prior = -0.5 * (bpm / PRIOR_BPM).log2().powi(2);
                let score = (1e6 * profile[lag].max(0.0)).ln_1p() + prior;
                (lag, bpm, score)
            })
            .collect();

        let Some(best) = scored.iter().map(|s| s.2).reduce(f32::max) else {
            return TempoEstimate::Undetermined;
        };
        let winners: Vec<f32> = scored
            .iter()
            .filter(|s| s.2 == best)
            .map(|s| s.1)
            .collect();
        log::debug!("Tempo candidates {:?} (score {:.3})", winners, best);

        match winners.as_slice() {
            [] => TempoEstimate::Undetermined,
            [bpm] => TempoEstimate::Single(*bpm),
            _ => TempoEstimate::Candidates(winners),
        }
    }

    fn track_beats(&self, onset: &[f32], tempo: f32) -> Vec<usize> {
        let period = (60.0 * self.frame_rate() / tempo).round().max(1.0) as usize;
        let local = local_score(&normalize_onsets(onset), period);
        let (cumulative, backlinks) = dynamic_program(&local, period);

        let Some(tail) = last_beat(&cumulative) else {
            return Vec::new();
        };

        let mut beats = vec![tail];
        let mut cursor = tail;
        while let Some(previous) = backlinks[cursor] {
            beats.push(previous);
            cursor = previous;
        }
        beats.reverse();

        trim_beats(&local, beats)
    }
}

/// Time-averaged, per-frame normalised autocorrelation of windows of the
/// envelope, indexed by lag in frames.
fn mean_tempogram(onset: &[f32]) -> Vec<f32> {
    let half = TEMPOGRAM_WINDOW / 2;
    let first = onset.first().copied().unwrap_or(0.0);
    let last = onset.last().copied().unwrap_or(0.0);

    // Linear ramps from zero into each edge value.
    let mut padded = Vec::with_capacity(onset.len() + 2 * half);
    padded.extend((0..half).map(|i| first * i as f32 / half as f32));
    padded.extend_from_slice(onset);
    padded.extend((0..half).map(|i| last * (half - 1 - i) as f32 / half as f32));

    let window = hann_window(TEMPOGRAM_WINDOW);
    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(TEMPOGRAM_FFT);
    let inverse = planner.plan_fft_inverse(TEMPOGRAM_FFT);

    let sum = (0..onset.len())
        .into_par_iter()
        .map(|t| {
            let mut buffer = vec![Complex::new(0.0f32, 0.0); TEMPOGRAM_FFT];
            for (slot, (&x, &w)) in buffer
                .iter_mut()
                .zip(padded[t..t + TEMPOGRAM_WINDOW].iter().zip(&window))
            {
                slot.re = x * w;
            }
            forward.process(&mut buffer);
            for c in buffer.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            inverse.process(&mut buffer);

            let mut ac: Vec<f32> = buffer[..TEMPOGRAM_WINDOW].iter().map(|c| c.re).collect();
            let peak = ac.iter().fold(0.0f32, |m, v| m.max(v.abs()));
            if peak > f32::MIN_POSITIVE {
                ac.iter_mut().for_each(|v| *v /= peak);
            }
            ac
        })
        .reduce(
            || vec![0.0f32; TEMPOGRAM_WINDOW],
            |mut acc, ac| {
                acc.iter_mut().zip(&ac).for_each(|(a, v)| *a += v);
                acc
            },
        );

    let count = onset.len().max(1) as f32;
    sum.into_iter().map(|v| v / count).collect()
}

/// Envelope scaled to unit sample standard deviation.
fn normalize_onsets(onset: &[f32]) -> Vec<f64> {
    let n = onset.len() as f64;
    let mean = onset.iter().map(|&v| v as f64).sum::<f64>() / n.max(1.0);
    let variance = onset
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0).max(1.0);
    let std = variance.sqrt() + f64::MIN_POSITIVE;
    onset.iter().map(|&v| v as f64 / std).collect()
}

/// Onset envelope smoothed by a Gaussian whose width tracks the period.
fn local_score(onset: &[f64], period: usize) -> Vec<f64> {
    let radius = period as isize;
    let kernel: Vec<f64> = (-radius..=radius)
        .map(|j| (-0.5 * (j as f64 * 32.0 / period as f64).powi(2)).exp())
        .collect();

    (0..onset.len())
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    let idx = i as isize + k as isize - radius;
                    (idx >= 0)
                        .then(|| onset.get(idx as usize).map(|v| v * w))
                        .flatten()
                })
                .sum()
        })
        .collect()
}

/// Cumulative score and best predecessor for every frame.
///
/// A predecessor lies between two periods and half a period back and pays a
/// log-squared penalty for deviating from one period. Frames before the
/// first one clearing 1% of the strongest local score start no chain.
fn dynamic_program(local: &[f64], period: usize) -> (Vec<f64>, Vec<Option<usize>>) {
    let n = local.len();
    let mut cumulative = vec![0.0f64; n];
    let mut backlinks: Vec<Option<usize>> = vec![None; n];
    if n == 0 {
        return (cumulative, backlinks);
    }

    let threshold = 0.01 * local.iter().copied().fold(f64::MIN, f64::max);
    let nearest = ((period as f64 / 2.0).round() as usize).max(1);
    let farthest = 2 * period;
    let log_period = (period as f64).ln();
    let mut started = false;

    cumulative[0] = local[0];
    for i in 1..n {
        let mut best: Option<(usize, f64)> = None;
        for gap in nearest..=farthest {
            let Some(loc) = i.checked_sub(gap) else {
                break;
            };
            let score = cumulative[loc] - TIGHTNESS * ((gap as f64).ln() - log_period).powi(2);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((loc, score));
            }
        }

        cumulative[i] = local[i] + best.map_or(0.0, |(_, s)| s);
        if !started && local[i] < threshold {
            backlinks[i] = None;
        } else {
            backlinks[i] = best.map(|(loc, _)| loc);
            started = true;
        }
    }

    (cumulative, backlinks)
}

/// Last local maximum of the cumulative score that reaches half the median
/// local-maximum value.
fn last_beat(cumulative: &[f64]) -> Option<usize> {
    let n = cumulative.len();
    let peaks: Vec<usize> = (0..n)
        .filter(|&i| {
            let before = cumulative[i.saturating_sub(1)];
            let after = cumulative[(i + 1).min(n - 1)];
            cumulative[i] > before && cumulative[i] >= after
        })
        .collect();
    if peaks.is_empty() {
        return None;
    }

    let mut values: Vec<f64> = peaks.iter().map(|&i| cumulative[i]).collect();
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    };

    peaks
        .into_iter()
        .rev()
        .find(|&i| 2.0 * cumulative[i] > median)
}

/// Tempogram lags below `max_lag` with their tempo, up to and including
/// `MAX_TEMPO`.
fn candidate_lags(fps: f32, max_lag: usize) -> Vec<(usize, f32)> {
    (1..max_lag)
        .map(|lag| (lag, 60.0 * fps / lag as f32))
        .filter(|&(_, bpm)| bpm <= MAX_TEMPO)
        .collect()
}

/// Drop weak beats from both ends of the sequence.
fn trim_beats(local: &[f64], mut beats: Vec<usize>) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    // Symmetric Hann(5): a steady beat must stay above half the smoothed RMS.
    const SMOOTHING: [f64; 5] = [0.0, 0.5, 1.0, 0.5, 0.0];

    let scores: Vec<f64> = beats.iter().map(|&b| local[b]).collect();
    let smoothed: Vec<f64> = (0..scores.len())
        .map(|i| {
            SMOOTHING
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    let idx = i as isize + k as isize - 2;
                    (idx >= 0)
                        .then(|| scores.get(idx as usize).map(|s| s * w))
                        .flatten()
                })
                .sum()
        })
        .collect();
    let rms = (smoothed.iter().map(|s| s * s).sum::<f64>() / smoothed.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let start = beats
        .iter()
        .position(|&b| local[b] > threshold)
        .unwrap_or(beats.len());
    let end = beats
        .iter()
        .rposition(|&b| local[b] > threshold)
        .map_or(start, |p| p + 1);
    beats.truncate(end);
    beats.drain(..start.min(end));
    beats
}
