use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::AnalysisError;

const CHUNK_SIZE: usize = 1024;

/// Resample mono audio from `from_rate` to `to_rate`.
///
/// The output holds `round(len * to_rate / from_rate)` samples with the
/// filter delay removed, so sample `i` of the output lines up with time
/// `i / to_rate` of the input.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AnalysisError> {
    if from_rate == 0 || to_rate == 0 {
        return Err(AnalysisError::InvalidParameter(format!(
            "cannot resample {}Hz -> {}Hz",
            from_rate, to_rate
        )));
    }
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| AnalysisError::Resample(format!("failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);

    // Keep feeding (zero-padded past the end) until the delayed tail is out.
    let mut pos = 0;
    while output.len() < expected + delay {
        let mut chunk = vec![0.0f32; CHUNK_SIZE];
        if pos < samples.len() {
            let end = (pos + CHUNK_SIZE).min(samples.len());
            chunk[..end - pos].copy_from_slice(&samples[pos..end]);
        }
        pos += CHUNK_SIZE;

        let input = vec![chunk];
        let resampled = resampler
            .process(&input, None)
            .map_err(|e| AnalysisError::Resample(e.to_string()))?;
        match resampled.first() {
            Some(channel) if !channel.is_empty() => output.extend_from_slice(channel),
            _ => {
                return Err(AnalysisError::Resample(
                    "resampler produced no output".into(),
                ))
            }
        }
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    log::debug!(
        "Resampled {} samples @ {}Hz -> {} samples @ {}Hz",
        samples.len(),
        from_rate,
        output.len(),
        to_rate
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, secs: f32) -> Vec<f32> {
        let n = (sr as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 22050, 22050).unwrap(), samples);
    }

    #[test]
    fn output_length_follows_ratio() {
        let samples = sine(440.0, 44100, 1.0);
        let out = resample(&samples, 44100, 22050).unwrap();
        assert_eq!(out.len(), 22050);
    }

    #[test]
    fn preserves_amplitude() {
        let samples = sine(440.0, 44100, 0.5);
        let out = resample(&samples, 44100, 22050).unwrap();
        // Skip the edges where the sinc filter sees padding.
        let mid = &out[2000..9000];
        let rms = (mid.iter().map(|s| s * s).sum::<f32>() / mid.len() as f32).sqrt();
        assert!((rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.03, "rms {}", rms);
    }

    #[test]
    fn zero_rate_rejected() {
        assert!(matches!(
            resample(&[0.0], 0, 22050),
            Err(AnalysisError::InvalidParameter(_))
        ));
    }
}
