use serde::{Deserialize, Serialize};

/// Mono samples at a fixed sample rate, immutable once loaded.
#[derive(Clone, Debug)]
pub struct AudioSignal {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Named frequency interval `[low_hz, high_hz)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandDefinition {
    pub name: &'static str,
    pub low_hz: f32,
    pub high_hz: f32,
}

impl BandDefinition {
    pub const fn new(name: &'static str, low_hz: f32, high_hz: f32) -> Self {
        Self {
            name,
            low_hz,
            high_hz,
        }
    }

    pub fn contains(&self, freq: f32) -> bool {
        freq >= self.low_hz && freq < self.high_hz
    }
}

/// The seven bands covering 20 Hz - 20 kHz, in output order.
pub const STANDARD_BANDS: [BandDefinition; 7] = [
    BandDefinition::new("sub_bass", 20.0, 60.0),
    BandDefinition::new("bass", 60.0, 250.0),
    BandDefinition::new("low_mids", 250.0, 500.0),
    BandDefinition::new("mids", 500.0, 2000.0),
    BandDefinition::new("high_mids", 2000.0, 4000.0),
    BandDefinition::new("highs", 4000.0, 8000.0),
    BandDefinition::new("brilliance", 8000.0, 20000.0),
];

/// Pitch-class naming and the reference pitch the constant-Q analysis
/// starts from. The first name labels the class of `reference_hz`.
#[derive(Clone, Debug, PartialEq)]
pub struct PitchClassTable {
    pub names: [&'static str; 12],
    pub reference_hz: f32,
}

impl Default for PitchClassTable {
    fn default() -> Self {
        Self {
            names: [
                "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
            ],
            // C1
            reference_hz: 32.703_197,
        }
    }
}

/// One value per frame, tagged by feature name.
#[derive(Clone, Debug)]
pub struct FeatureSeries {
    pub name: String,
    pub values: Vec<f32>,
}

impl FeatureSeries {
    pub fn new(name: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Global tempo plus ascending beat timestamps in seconds.
#[derive(Clone, Debug)]
pub struct BeatTrack {
    /// Beats per minute, always > 0.
    pub tempo: f32,
    pub beat_frames: Vec<usize>,
    pub beat_times: Vec<f64>,
}

/// Per-frame record of the output artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub time: f64,
    pub rms: f64,
    pub centroid: f64,
    pub centroid_hz: f64,
    pub contrast: f64,
    pub onset: f64,
    pub harmonic: f64,
    pub percussive: f64,
    pub bands: Vec<f64>,
    pub chroma: Vec<f64>,
}

/// Terminal result of one analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub sample_rate: u32,
    pub hop_length: usize,
    pub duration: f64,
    pub tempo: f64,
    pub beats: Vec<f64>,
    pub band_names: Vec<String>,
    pub chroma_names: Vec<String>,
    pub frames: Vec<FrameRecord>,
}
