use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub gui: GuiConfig,
    #[serde(default)]
    pub lastfm: LastFmConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate", alias = "sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_chunk_size", alias = "chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_record_seconds", alias = "record_seconds")]
    pub record_seconds: f32,
    #[serde(default = "default_band_count", alias = "band_count")]
    pub band_count: usize,
    #[serde(default = "default_low_cutoff_hz", alias = "low_cutoff_hz")]
    pub low_cutoff_hz: f64,
    #[serde(default)]
    pub device: Option<String>,
    /// Scratch copy of the latest recognition recording; `None` skips writing it.
    #[serde(default = "default_recording_path", alias = "recording_path")]
    pub recording_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Seconds, applied to every HTTP call.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    #[serde(default = "default_max_backoff", alias = "max_backoff_seconds")]
    pub max_backoff_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuiConfig {
    #[serde(default = "default_width", alias = "screen_width")]
    pub screen_width: u32,
    #[serde(default = "default_height", alias = "screen_height")]
    pub screen_height: u32,
    /// Milliseconds to wait before retrying after a failed recognition cycle.
    #[serde(default = "default_update_interval", alias = "update_interval")]
    pub update_interval: u64,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_fullscreen")]
    pub fullscreen: bool,
    #[serde(default = "default_magnitude_scale", alias = "magnitude_scale")]
    pub magnitude_scale: f32,
    #[serde(default = "default_scroll_window", alias = "scroll_window")]
    pub scroll_window: usize,
    #[serde(default = "default_cover_art_path", alias = "cover_art_path")]
    pub cover_art_path: PathBuf,
    #[serde(default = "default_logo_path", alias = "logo_path")]
    pub logo_path: Option<PathBuf>,
    #[serde(default, alias = "font_path")]
    pub font_path: Option<PathBuf>,
    #[serde(default, alias = "font_url")]
    pub font_url: Option<String>,
}

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastFmConfig {
    #[serde(default, alias = "api_key")]
    pub api_key: String,
    #[serde(default, alias = "api_secret")]
    pub api_secret: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default, alias = "api_token")]
    pub api_token: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            chunk_size: default_chunk_size(),
            record_seconds: default_record_seconds(),
            band_count: default_band_count(),
            low_cutoff_hz: default_low_cutoff_hz(),
            device: None,
            recording_path: default_recording_path(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_backoff_seconds: default_max_backoff(),
        }
    }
}

impl Default for GuiConfig {
    fn default() -> Self {
        Self {
            screen_width: default_width(),
            screen_height: default_height(),
            update_interval: default_update_interval(),
            fps: default_fps(),
            fullscreen: default_fullscreen(),
            magnitude_scale: default_magnitude_scale(),
            scroll_window: default_scroll_window(),
            cover_art_path: default_cover_art_path(),
            logo_path: default_logo_path(),
            font_path: None,
            font_url: None,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_token: String::new(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.max(0.1))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.max_backoff_seconds.max(0.0))
    }
}

impl LastFmConfig {
    /// Scrobbling needs every credential.
    pub fn is_complete(&self) -> bool {
        !(self.api_key.is_empty()
            || self.api_secret.is_empty()
            || self.username.is_empty()
            || self.password.is_empty())
    }
}

impl fmt::Debug for LastFmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LastFmConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Debug for RecognitionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_chunk_size() -> usize { 1024 }
fn default_record_seconds() -> f32 { 10.0 }
fn default_band_count() -> usize { 200 }
fn default_low_cutoff_hz() -> f64 { crate::audio::spectrum::DEFAULT_LOW_CUTOFF_HZ }
fn default_recording_path() -> Option<PathBuf> { Some(PathBuf::from("output.wav")) }
fn default_timeout() -> f64 { 10.0 }
fn default_max_backoff() -> f64 { 60.0 }
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_update_interval() -> u64 { 1000 }
fn default_fps() -> u32 { 60 }
fn default_fullscreen() -> bool { true }
fn default_magnitude_scale() -> f32 { 100_000.0 }
fn default_scroll_window() -> usize { 30 }
fn default_cover_art_path() -> PathBuf { PathBuf::from("image.jpg") }
fn default_logo_path() -> Option<PathBuf> { Some(PathBuf::from("lastfm.jpg")) }
fn default_endpoint() -> String { "https://api.audd.io/".into() }

/// Parse a config file; `.json` files use the JSON layout, everything else is TOML.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Explicit path, else `earmark.toml` / `config.json` in the working directory, else the
/// per-user config directory.
pub fn find_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }
    for local in ["earmark.toml", "config.json"] {
        let local = PathBuf::from(local);
        if local.exists() {
            return Some(local);
        }
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("earmark").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("earmark").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
