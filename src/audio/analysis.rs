//! Pipeline orchestration: load, transform, extract, normalize, assemble.
//!
//! The spectrogram and the harmonic/percussive split are computed side by
//! side, then every extractor runs as its own task over that shared,
//! read-only data. Normalization and assembly wait for all of them.

use std::path::Path;

use super::assemble::{assemble, FeatureSet, Metadata};
use super::decode::{ensure_input, load_signal};
use super::features::{
    AnalysisResult, AudioSignal, BandDefinition, BeatTrack, FeatureSeries, PitchClassTable,
    STANDARD_BANDS,
};
use super::normalize::min_max;
use crate::beat::BeatTracker;
use crate::dsp::hpss;
use crate::dsp::stft::{frame_count, Stft, N_FFT};
use crate::error::AnalysisError;
use crate::extract::{chroma, energy, onset, spectral};
use crate::progress::{ProgressObserver, ProgressTracker, Stage};

pub const DEFAULT_SAMPLE_RATE: u32 = 22050;
pub const DEFAULT_HOP_LENGTH: usize = 512;

#[derive(Clone, Debug)]
pub struct AnalysisSettings {
    pub sample_rate: u32,
    pub hop_length: usize,
    pub bands: Vec<BandDefinition>,
    pub pitch_classes: PitchClassTable,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            hop_length: DEFAULT_HOP_LENGTH,
            bands: STANDARD_BANDS.to_vec(),
            pitch_classes: PitchClassTable::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.sample_rate == 0 {
            return Err(AnalysisError::InvalidParameter(
                "sample rate must be positive".into(),
            ));
        }
        if self.hop_length == 0 {
            return Err(AnalysisError::InvalidParameter(
                "hop length must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Decode `path` and run the full pipeline on it.
pub fn analyze_file(
    path: &Path,
    settings: &AnalysisSettings,
    observer: &dyn ProgressObserver,
) -> Result<AnalysisResult, AnalysisError> {
    settings.validate()?;
    ensure_input(path)?;

    let tracker = ProgressTracker::new(observer, Stage::ALL.len());
    log::info!("Loading {}...", path.display());
    let signal = load_signal(path, settings.sample_rate)?;
    tracker.complete(Stage::Loading);

    run(&signal, settings, &tracker)
}

/// Run the pipeline on samples already in memory, at their own sample rate.
pub fn analyze_signal(
    signal: &AudioSignal,
    settings: &AnalysisSettings,
    observer: &dyn ProgressObserver,
) -> Result<AnalysisResult, AnalysisError> {
    settings.validate()?;
    if signal.sample_rate == 0 {
        return Err(AnalysisError::InvalidParameter(
            "signal sample rate must be positive".into(),
        ));
    }
    let tracker = ProgressTracker::new(observer, Stage::ALL.len() - 1);
    run(signal, settings, &tracker)
}

fn run(
    signal: &AudioSignal,
    settings: &AnalysisSettings,
    tracker: &ProgressTracker<'_>,
) -> Result<AnalysisResult, AnalysisError> {
    let samples = signal.samples.as_slice();
    let sr = signal.sample_rate;
    let hop = settings.hop_length;
    let n_frames = frame_count(samples.len(), hop);
    log::info!("Analyzing {} samples into {} frames (hop {})", samples.len(), n_frames, hop);

    let (spec, separation) = rayon::join(
        || {
            let spec = Stft::new(N_FFT, hop).magnitude(samples, sr);
            tracker.complete(Stage::Spectrogram);
            spec
        },
        || {
            let split = hpss::separate(samples);
            tracker.complete(Stage::Separating);
            split
        },
    );

    let mut rms = Vec::new();
    let mut centroid_hz = Vec::new();
    let mut contrast = Vec::new();
    let mut bands: Vec<FeatureSeries> = Vec::new();
    let mut onset_env = Vec::new();
    let mut beats: Option<BeatTrack> = None;
    let mut harmonic = Vec::new();
    let mut percussive = Vec::new();
    let mut chroma_rows = Vec::new();

    let spec = &spec;
    let separation = &separation;
    rayon::scope(|s| {
        s.spawn(|_| {
            rms = energy::rms(samples, hop);
            tracker.complete(Stage::Rms);
        });
        s.spawn(|_| {
            centroid_hz = spectral::centroid(spec);
            tracker.complete(Stage::Centroid);
        });
        s.spawn(|_| {
            contrast = spectral::contrast(spec);
            tracker.complete(Stage::Contrast);
        });
        s.spawn(|_| {
            bands = spectral::band_energies(spec, &settings.bands);
            tracker.complete(Stage::Bands);
        });
        s.spawn(|_| {
            onset_env = onset::onset_strength(&separation.percussive, sr, hop);
            tracker.complete(Stage::Onset);
            beats = Some(BeatTracker::new(sr, hop).track(&onset_env));
            tracker.complete(Stage::Beats);
        });
        s.spawn(|_| {
            harmonic = energy::rms(&separation.harmonic, hop);
            percussive = energy::rms(&separation.percussive, hop);
            tracker.complete(Stage::HarmonicPercussive);
        });
        s.spawn(|_| {
            chroma_rows =
                chroma::chroma(&separation.harmonic, sr, hop, &settings.pitch_classes);
            tracker.complete(Stage::Chroma);
        });
    });

    let beats = beats.unwrap_or_else(|| BeatTracker::new(sr, hop).track(&[]));
    log::info!("Tempo: {:.1} BPM, {} beats", beats.tempo, beats.beat_frames.len());

    let features = FeatureSet {
        rms: min_max(&rms),
        centroid: min_max(&centroid_hz),
        contrast: min_max(&contrast),
        onset: min_max(&onset_env),
        harmonic: min_max(&harmonic),
        percussive: min_max(&percussive),
        bands: bands
            .into_iter()
            .map(|band| FeatureSeries::new(band.name, min_max(&band.values)))
            .collect(),
        centroid_hz,
        chroma: chroma_rows,
    };
    tracker.complete(Stage::Normalizing);

    let meta = Metadata {
        sample_rate: sr,
        hop_length: hop,
        duration: signal.duration(),
        n_frames,
        pitch_classes: &settings.pitch_classes,
    };
    let result = assemble(&meta, &features, &beats)?;
    tracker.complete(Stage::Assembling);

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::Recorder;
    use crate::progress::Silent;

    fn sine(freq: f64, sr: u32, secs: f64) -> Vec<f32> {
        let n = (sr as f64 * secs) as usize;
        (0..n)
            .map(|i| (0.5 * (2.0 * std::f64::consts::PI * freq * i as f64 / sr as f64).sin()) as f32)
            .collect()
    }

    fn normalized_values(result: &AnalysisResult) -> Vec<f64> {
        result
            .frames
            .iter()
            .flat_map(|f| {
                [f.rms, f.centroid, f.contrast, f.onset, f.harmonic, f.percussive]
                    .into_iter()
                    .chain(f.bands.iter().copied())
            })
            .collect()
    }

    #[test]
    fn silent_input_yields_zero_series() {
        let signal = AudioSignal::new(vec![0.0; 5 * 22050], 22050);
        let result = analyze_signal(&signal, &AnalysisSettings::default(), &Silent).unwrap();

        assert_eq!(result.frames.len(), 216);
        assert!(normalized_values(&result).iter().all(|&v| v == 0.0));
        assert!(result.frames.iter().all(|f| f.chroma.iter().all(|&c| c == 0.0)));
        assert!(result.beats.is_empty());
        assert_eq!(result.tempo, 120.0);
        assert_eq!(result.duration, 5.0);
        assert_eq!(result.band_names.len(), 7);
        assert_eq!(result.chroma_names.len(), 12);
    }

    #[test]
    fn sine_tone_properties() {
        let sr = 22050;
        let signal = AudioSignal::new(sine(440.0, sr, 3.0), sr);
        let result = analyze_signal(&signal, &AnalysisSettings::default(), &Silent).unwrap();
        let n = frame_count(signal.samples.len(), 512);
        assert_eq!(result.frames.len(), n);

        for frame in &result.frames[5..n - 5] {
            assert!((frame.centroid_hz - 440.0).abs() < 30.0, "centroid {}", frame.centroid_hz);
            assert_eq!(frame.bands.len(), 7);
            assert_eq!(frame.chroma.len(), 12);
        }
        let mid = &result.frames[n / 2];
        assert_eq!(mid.chroma[9], 1.0);

        assert!(normalized_values(&result).iter().all(|&v| (0.0..=1.0).contains(&v)));
        for frame in &result.frames {
            let max = frame.chroma.iter().copied().fold(0.0f64, f64::max);
            assert!(max == 0.0 || max == 1.0, "chroma max {}", max);
        }
        assert!(result.tempo > 0.0);
        assert!(result.beats.windows(2).all(|w| w[1] > w[0]));
        assert!(result.beats.iter().all(|&t| t >= 0.0 && t <= result.duration));
    }

    #[test]
    fn result_survives_json_round_trip() {
        let signal = AudioSignal::new(sine(220.0, 22050, 1.0), 22050);
        let result = analyze_signal(&signal, &AnalysisSettings::default(), &Silent).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.frames.len(), result.frames.len());
        assert_eq!(back.band_names, result.band_names);
        assert_eq!(back.chroma_names, result.chroma_names);
        assert_eq!(back, result);
    }

    #[test]
    fn every_stage_reports_once() {
        let recorder = Recorder::default();
        let signal = AudioSignal::new(vec![0.0; 4096], 22050);
        analyze_signal(&signal, &AnalysisSettings::default(), &recorder).unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), Stage::ALL.len() - 1);
        for stage in Stage::ALL.iter().filter(|s| **s != Stage::Loading) {
            assert_eq!(events.iter().filter(|e| e.stage == *stage).count(), 1, "{:?}", stage);
        }
        assert_eq!(events.last().map(|e| e.stage), Some(Stage::Assembling));
        assert_eq!(events.last().map(|e| e.fraction), Some(1.0));
    }

    #[test]
    fn custom_hop_and_band_table() {
        let settings = AnalysisSettings {
            hop_length: 256,
            bands: vec![
                BandDefinition::new("low", 0.0, 1000.0),
                BandDefinition::new("high", 1000.0, 11025.0),
            ],
            ..AnalysisSettings::default()
        };
        let signal = AudioSignal::new(sine(440.0, 22050, 0.5), 22050);
        let result = analyze_signal(&signal, &settings, &Silent).unwrap();
        assert_eq!(result.hop_length, 256);
        assert_eq!(result.frames.len(), frame_count(signal.samples.len(), 256));
        assert_eq!(result.band_names, vec!["low", "high"]);
        assert!(result.frames.iter().all(|f| f.bands.len() == 2));
    }

    #[test]
    fn rejects_zero_hop() {
        let settings = AnalysisSettings {
            hop_length: 0,
            ..AnalysisSettings::default()
        };
        let signal = AudioSignal::new(vec![0.0; 100], 22050);
        assert!(matches!(
            analyze_signal(&signal, &settings, &Silent),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }

    #[test]
    fn missing_file_is_reported_before_loading() {
        let recorder = Recorder::default();
        let path = std::env::temp_dir().join("audiolens-does-not-exist.wav");
        match analyze_file(&path, &AnalysisSettings::default(), &recorder) {
            Err(AnalysisError::InputNotFound(p)) => assert_eq!(p, path),
            other => panic!("unexpected {:?}", other.map(|r| r.frames.len())),
        }
        assert!(recorder.events.lock().unwrap().is_empty());
    }
}
