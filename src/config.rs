use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::analysis::AnalyzerConfig;
use crate::audio::beat::BeatConfig;
use crate::audio::waveform::DEFAULT_ENVELOPE_POINTS;
use crate::engine::EngineConfig;
use crate::visual::preset::Preset;

const CONFIG_FILE: &str = "pulseviz.toml";
const APP_DIR: &str = "pulseviz";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub beat: BeatConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub visual: VisualConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default)]
    pub bitrate: Option<String>,
    /// Font file path or URL for text overlays
    #[serde(default)]
    pub font: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// HTTP fetch timeout, seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,
    #[serde(default = "default_waveform_points")]
    pub waveform_points: usize,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    #[serde(default)]
    pub preset: Preset,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f32,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            scale: default_scale(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            bitrate: None,
            font: None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: default_fetch_timeout(),
            waveform_points: default_waveform_points(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            preset: Preset::default(),
            sensitivity: default_sensitivity(),
            smoothing: default_smoothing(),
        }
    }
}

fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_scale() -> f32 { 1.0 }
fn default_fps() -> u32 { 30 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_fetch_timeout() -> u64 { 30 }
fn default_waveform_points() -> usize { DEFAULT_ENVELOPE_POINTS }
fn default_sensitivity() -> f32 { 1.0 }
fn default_smoothing() -> f32 { 0.8 }

impl Config {
    pub fn engine_config(&self) -> EngineConfig {
        let waveform_points = NonZeroUsize::new(self.source.waveform_points).unwrap_or_else(|| {
            log::warn!("waveform_points must be positive, using {}", DEFAULT_ENVELOPE_POINTS);
            NonZeroUsize::new(DEFAULT_ENVELOPE_POINTS).unwrap_or(NonZeroUsize::MIN)
        });
        EngineConfig {
            analyzer: self.analyzer,
            beat: self.beat,
            waveform_points,
            fetch_timeout: Duration::from_secs(self.source.fetch_timeout.max(1)),
        }
    }
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match parse_config(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, then ./pulseviz.toml, then ~/.config/pulseviz/config.toml,
/// then the platform config directory.
pub fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join(APP_DIR).join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join(APP_DIR).join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}
