use super::features::{AnalysisResult, BeatTrack, FeatureSeries, FrameRecord, PitchClassTable};
use crate::dsp::stft::frames_to_time;
use crate::error::AnalysisError;

/// Decimal places kept for times and normalized values.
const FINE: i32 = 4;
/// Decimal places kept for raw centroid frequencies.
const HZ: i32 = 1;
/// Decimal places kept for tempo.
const BPM: i32 = 2;

/// Per-frame series ready for assembly. Everything except `centroid_hz` is
/// already normalized to `[0, 1]`.
#[derive(Clone, Debug, Default)]
pub struct FeatureSet {
    pub rms: Vec<f32>,
    pub centroid: Vec<f32>,
    pub centroid_hz: Vec<f32>,
    pub contrast: Vec<f32>,
    pub onset: Vec<f32>,
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
    pub bands: Vec<FeatureSeries>,
    pub chroma: Vec<[f32; 12]>,
}

/// Run-level facts stamped on the result.
pub struct Metadata<'a> {
    pub sample_rate: u32,
    pub hop_length: usize,
    pub duration: f64,
    pub n_frames: usize,
    pub pitch_classes: &'a PitchClassTable,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn check_len(feature: &str, expected: usize, actual: usize) -> Result<(), AnalysisError> {
    if expected == actual {
        Ok(())
    } else {
        Err(AnalysisError::FrameCountMismatch {
            feature: feature.to_string(),
            expected,
            actual,
        })
    }
}

impl FeatureSet {
    fn validate(&self, n_frames: usize) -> Result<(), AnalysisError> {
        let scalars = [
            ("rms", self.rms.len()),
            ("centroid", self.centroid.len()),
            ("centroid_hz", self.centroid_hz.len()),
            ("contrast", self.contrast.len()),
            ("onset", self.onset.len()),
            ("harmonic", self.harmonic.len()),
            ("percussive", self.percussive.len()),
            ("chroma", self.chroma.len()),
        ];
        for (name, len) in scalars {
            check_len(name, n_frames, len)?;
        }
        for band in &self.bands {
            check_len(&band.name, n_frames, band.len())?;
        }
        Ok(())
    }
}

/// Zip every series by frame index into the output record.
pub fn assemble(
    meta: &Metadata<'_>,
    features: &FeatureSet,
    beats: &BeatTrack,
) -> Result<AnalysisResult, AnalysisError> {
    features.validate(meta.n_frames)?;

    let fine = |v: f32| round_to(v as f64, FINE);
    let frames = (0..meta.n_frames)
        .map(|i| FrameRecord {
            time: round_to(frames_to_time(i, meta.hop_length, meta.sample_rate), FINE),
            rms: fine(features.rms[i]),
            centroid: fine(features.centroid[i]),
            centroid_hz: round_to(features.centroid_hz[i] as f64, HZ),
            contrast: fine(features.contrast[i]),
            onset: fine(features.onset[i]),
            harmonic: fine(features.harmonic[i]),
            percussive: fine(features.percussive[i]),
            bands: features.bands.iter().map(|b| fine(b.values[i])).collect(),
            chroma: features.chroma[i].iter().map(|&c| fine(c)).collect(),
        })
        .collect();

    Ok(AnalysisResult {
        sample_rate: meta.sample_rate,
        hop_length: meta.hop_length,
        duration: round_to(meta.duration, FINE),
        tempo: round_to(beats.tempo as f64, BPM),
        beats: beats.beat_times.iter().map(|&t| round_to(t, FINE)).collect(),
        band_names: features.bands.iter().map(|b| b.name.clone()).collect(),
        chroma_names: meta.pitch_classes.names.iter().map(|n| n.to_string()).collect(),
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(n: usize) -> FeatureSet {
        FeatureSet {
            rms: vec![0.123_456; n],
            centroid: vec![1.0; n],
            centroid_hz: vec![440.049; n],
            contrast: vec![0.5; n],
            onset: vec![0.0; n],
            harmonic: vec![0.25; n],
            percussive: vec![0.75; n],
            bands: vec![
                FeatureSeries::new("low", vec![0.1; n]),
                FeatureSeries::new("high", vec![0.9; n]),
            ],
            chroma: vec![[0.0; 12]; n],
        }
    }

    fn beats() -> BeatTrack {
        BeatTrack {
            tempo: 117.453_47,
            beat_frames: vec![10, 32],
            beat_times: vec![0.232_199_5, 0.743_038_5],
        }
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(0.123_456, 4), 0.1235);
        assert_eq!(round_to(440.049, 1), 440.0);
        assert_eq!(round_to(117.456, 2), 117.46);
        assert_eq!(round_to(0.0, 4), 0.0);
    }

    #[test]
    fn zips_series_by_frame() {
        let table = PitchClassTable::default();
        let meta = Metadata {
            sample_rate: 22050,
            hop_length: 512,
            duration: 0.1161,
            n_frames: 6,
            pitch_classes: &table,
        };
        let result = assemble(&meta, &features(6), &beats()).unwrap();

        assert_eq!(result.frames.len(), 6);
        assert_eq!(result.band_names, vec!["low", "high"]);
        assert_eq!(result.chroma_names.len(), 12);
        assert_eq!(result.chroma_names[0], "C");
        assert_eq!(result.tempo, 117.45);
        assert_eq!(result.beats, vec![0.2322, 0.743]);

        let frame = &result.frames[1];
        assert_eq!(frame.time, 0.0232);
        assert_eq!(frame.rms, 0.1235);
        assert_eq!(frame.centroid_hz, 440.0);
        assert_eq!(frame.bands, vec![0.1, 0.9]);
        assert_eq!(frame.chroma.len(), 12);
    }

    #[test]
    fn length_mismatch_names_the_feature() {
        let table = PitchClassTable::default();
        let meta = Metadata {
            sample_rate: 22050,
            hop_length: 512,
            duration: 0.0,
            n_frames: 6,
            pitch_classes: &table,
        };
        let mut set = features(6);
        set.bands[1].values.pop();
        match assemble(&meta, &set, &beats()) {
            Err(AnalysisError::FrameCountMismatch {
                feature,
                expected,
                actual,
            }) => {
                assert_eq!(feature, "high");
                assert_eq!(expected, 6);
                assert_eq!(actual, 5);
            }
            other => panic!("expected mismatch, got {:?}", other.map(|r| r.frames.len())),
        }
    }
}
