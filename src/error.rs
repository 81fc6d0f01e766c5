use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the analysis pipeline.
///
/// Silent or constant input is not an error: it flows through the pipeline
/// and produces all-zero normalized series.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("resampling failed: {0}")]
    Resample(String),

    #[error("invalid analysis parameter: {0}")]
    InvalidParameter(String),

    #[error("feature '{feature}' has {actual} frames, expected {expected}")]
    FrameCountMismatch {
        feature: String,
        expected: usize,
        actual: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    pub(crate) fn decode(path: &std::path::Path, reason: impl ToString) -> Self {
        AnalysisError::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_path() {
        let err = AnalysisError::InputNotFound(PathBuf::from("missing.wav"));
        assert_eq!(err.to_string(), "input file not found: missing.wav");

        let err = AnalysisError::decode(std::path::Path::new("x.mp3"), "bad header");
        assert_eq!(err.to_string(), "failed to decode x.mp3: bad header");
    }
}
