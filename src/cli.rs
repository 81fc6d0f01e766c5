use clap::Parser;
use std::path::PathBuf;

use crate::audio::analysis::{DEFAULT_HOP_LENGTH, DEFAULT_SAMPLE_RATE};

#[derive(Parser, Debug)]
#[command(
    name = "audiolens",
    version,
    about = "Extract per-frame audio features for audio-reactive visuals"
)]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: PathBuf,

    /// Output JSON file [default: <output dir>/<input stem>.json]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Analysis sample rate in Hz
    #[arg(long = "sr", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Hop length between analysis frames, in samples
    #[arg(long = "hop", default_value_t = DEFAULT_HOP_LENGTH)]
    pub hop_length: usize,

    /// Config file (defaults to ./audiolens.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write indented JSON
    #[arg(long)]
    pub pretty: bool,

    /// Log stage progress instead of drawing a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["audiolens", "song.mp3"]).unwrap();
        assert_eq!(cli.input, PathBuf::from("song.mp3"));
        assert_eq!(cli.sample_rate, 22050);
        assert_eq!(cli.hop_length, 512);
        assert!(cli.output.is_none());
        assert!(!cli.pretty);
        assert!(!cli.no_progress);
    }

    #[test]
    fn overrides() {
        let cli = Cli::try_parse_from([
            "audiolens", "in.wav", "-o", "out.json", "--sr", "44100", "--hop", "256", "--pretty",
            "--no-progress",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out.json")));
        assert_eq!(cli.sample_rate, 44100);
        assert_eq!(cli.hop_length, 256);
        assert!(cli.pretty);
        assert!(cli.no_progress);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["audiolens"]).is_err());
    }
}
