mod audio;
mod beat;
mod cli;
mod config;
mod dsp;
mod error;
mod extract;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use audio::analysis::{AnalysisSettings, DEFAULT_HOP_LENGTH, DEFAULT_SAMPLE_RATE};
use cli::Cli;
use progress::{BarObserver, LogObserver, ProgressObserver};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Merge: config values apply only when the CLI is at its default
    let mut output_dir = PathBuf::from("data");
    if let Some(path) = config::discover(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            if cli.sample_rate == DEFAULT_SAMPLE_RATE { cli.sample_rate = cfg.analysis.sample_rate; }
            if cli.hop_length == DEFAULT_HOP_LENGTH { cli.hop_length = cfg.analysis.hop_length; }
            if !cli.pretty { cli.pretty = cfg.output.pretty; }
            output_dir = cfg.output.dir;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Checked before anything touches the filesystem.
    audio::decode::ensure_input(&cli.input)?;

    let settings = AnalysisSettings {
        sample_rate: cli.sample_rate,
        hop_length: cli.hop_length,
        ..AnalysisSettings::default()
    };
    settings.validate()?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input, &output_dir));

    log::info!("audiolens - audio feature extraction");
    log::info!("Input: {}", cli.input.display());
    log::info!("Output: {}", output.display());
    log::info!("Sample rate: {}Hz, hop: {}", settings.sample_rate, settings.hop_length);

    let result = if cli.no_progress {
        analyze(&cli.input, &settings, &LogObserver)?
    } else {
        let bar = BarObserver::new();
        let result = analyze(&cli.input, &settings, &bar);
        bar.finish();
        result?
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    if cli.pretty {
        serde_json::to_writer_pretty(&mut writer, &result)?;
    } else {
        serde_json::to_writer(&mut writer, &result)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", output.display()))?;

    log::info!("Done! Wrote {}", output.display());
    log::info!("Frames: {}", result.frames.len());
    log::info!("Tempo: {} BPM", result.tempo);
    log::info!("Beats: {}", result.beats.len());

    Ok(())
}

fn analyze(
    input: &Path,
    settings: &AnalysisSettings,
    observer: &dyn ProgressObserver,
) -> Result<audio::features::AnalysisResult> {
    Ok(audio::analysis::analyze_file(input, settings, observer)?)
}

/// `<dir>/<input stem>.json`
fn default_output(input: &Path, dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "analysis".to_string());
    dir.join(format!("{}.json", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_uses_input_stem() {
        assert_eq!(
            default_output(Path::new("music/track 01.mp3"), Path::new("data")),
            PathBuf::from("data/track 01.json")
        );
        assert_eq!(
            default_output(Path::new("song"), Path::new("out")),
            PathBuf::from("out/song.json")
        );
    }
}
