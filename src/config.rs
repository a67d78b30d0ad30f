use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEGATE_CONFIG_PATH").unwrap_or("/usr/local/etc/facegate/config.toml"))
});

pub static DATA_DIR: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEGATE_DATA_DIR").unwrap_or("/var/lib/facegate"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefer the threshold the matcher reports per candidate over `fallback_threshold`.
    pub use_source_threshold: bool,
    /// Maximum distance still accepted when no source threshold applies.
    pub fallback_threshold: f64,
    /// Model identifier, passed through to the matcher untouched.
    pub model: String,
    /// Detector backend identifier, passed through to the matcher untouched.
    pub detector_backend: String,
    /// Recognizer executable invoked once per frame.
    pub matcher_command: String,
    /// Directory the capture daemon drops frames into.
    pub frame_dir: String,
    /// How long to wait on an empty frame spool before treating the stream
    /// as ended.
    pub spool_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            use_source_threshold: true,
            fallback_threshold: 0.45,
            model: "VGG-Face".to_string(),
            detector_backend: "opencv".to_string(),
            matcher_command: "facegate-recognizer".to_string(),
            frame_dir: "/run/facegate/frames".to_string(),
            spool_idle_secs: 30,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    anyhow::ensure!(
        cfg.fallback_threshold >= 0.0,
        "fallback_threshold must be non-negative"
    );
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
