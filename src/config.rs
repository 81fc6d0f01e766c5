use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::analysis::{DEFAULT_HOP_LENGTH, DEFAULT_SAMPLE_RATE};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_hop_length")]
    pub hop_length: usize,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub pretty: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            hop_length: default_hop_length(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            pretty: false,
        }
    }
}

fn default_sample_rate() -> u32 { DEFAULT_SAMPLE_RATE }
fn default_hop_length() -> usize { DEFAULT_HOP_LENGTH }
fn default_dir() -> PathBuf { PathBuf::from("data") }

/// Explicit path first, then `./audiolens.toml`, then the platform config dir.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("audiolens.toml");
    if local.exists() {
        return Some(local);
    }
    let global = dirs::config_dir()?.join("audiolens").join("config.toml");
    global.exists().then_some(global)
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::debug!("{}: {}", path.display(), err);
            None
        }
    }
}
