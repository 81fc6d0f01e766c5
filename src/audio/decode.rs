use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::features::AudioSignal;
use super::resample::resample;
use crate::error::AnalysisError;

/// Fails with `InputNotFound` unless `path` names an existing regular file.
pub fn ensure_input(path: &Path) -> Result<(), AnalysisError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AnalysisError::InputNotFound(path.to_path_buf()))
    }
}

/// Decode `path` to mono and resample it to `target_rate`.
pub fn load_signal(path: &Path, target_rate: u32) -> Result<AudioSignal, AnalysisError> {
    if target_rate == 0 {
        return Err(AnalysisError::InvalidParameter(
            "sample rate must be positive".into(),
        ));
    }
    let (samples, native_rate) = decode_mono(path)?;
    let samples = resample(&samples, native_rate, target_rate)?;

    let signal = AudioSignal::new(samples, target_rate);
    log::info!(
        "Duration: {:.2}s, Sample rate: {}Hz",
        signal.duration(),
        signal.sample_rate
    );
    Ok(signal)
}

/// Decode every packet of the first audio track, averaging channels.
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32), AnalysisError> {
    ensure_input(path)?;
    let file = std::fs::File::open(path).map_err(|e| open_error(path, e))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AnalysisError::decode(path, format!("unrecognised format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AnalysisError::decode(path, "no audio tracks found"))?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnalysisError::decode(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AnalysisError::decode(path, format!("no decoder: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AnalysisError::decode(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(err)) => {
                log::debug!("Skipping corrupt packet: {}", err);
                continue;
            }
            Err(e) => return Err(AnalysisError::decode(path, e)),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        downmix_into(sample_buf.samples(), channels, &mut mono);
    }

    log::debug!(
        "Decoded audio: {} samples, {}Hz, {} channel(s)",
        mono.len(),
        sample_rate,
        channels
    );

    Ok((mono, sample_rate))
}

/// A file we may not read is as unusable as one that is missing.
fn open_error(path: &Path, e: std::io::Error) -> AnalysisError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            AnalysisError::InputNotFound(path.to_path_buf())
        }
        _ => AnalysisError::Io(e),
    }
}

fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 1 {
        out.extend_from_slice(interleaved);
    } else {
        out.extend(
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }
}
