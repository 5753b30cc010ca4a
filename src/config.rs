// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as pretty-printed JSON under the user config directory. Missing
//! fields fall back to their defaults so older files keep loading.

use crate::backends::capture::CaptureBackendType;
use crate::constants::{app_info, capture, encoding, inference, timing};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the generation API
    pub api_base_url: String,
    /// API key (falls back to GEMINI_API_KEY / GOOGLE_API_KEY when unset)
    pub api_key: Option<String>,
    /// Model used for swap requests
    pub swap_model: String,
    /// Model used for persona refinement
    pub refine_model: String,
    /// Seconds between swap ticks
    pub tick_interval_secs: u64,
    /// JPEG quality for frame snapshots (1-100)
    pub jpeg_quality: u8,
    /// Requested capture width (hint)
    pub capture_width: u32,
    /// Requested capture height (hint)
    pub capture_height: u32,
    /// Capture backend to use
    pub backend: CaptureBackendType,
    /// Upper bound for device acquisition
    pub capture_timeout_secs: u64,
    /// Upper bound for one inference request
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: inference::DEFAULT_API_BASE.to_string(),
            api_key: None,
            swap_model: inference::DEFAULT_SWAP_MODEL.to_string(),
            refine_model: inference::DEFAULT_REFINE_MODEL.to_string(),
            tick_interval_secs: timing::DEFAULT_TICK_INTERVAL.as_secs(),
            jpeg_quality: encoding::FRAME_JPEG_QUALITY,
            capture_width: capture::TARGET_WIDTH,
            capture_height: capture::TARGET_HEIGHT,
            backend: CaptureBackendType::default(),
            capture_timeout_secs: timing::DEFAULT_CAPTURE_TIMEOUT_SECS,
            request_timeout_secs: timing::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir
            .join(app_info::CONFIG_DIR_NAME)
            .join(app_info::CONFIG_FILE_NAME))
    }

    /// Load from the default location, using defaults if the file is missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from an explicit path, using defaults if the file is missing
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path()?)
    }

    /// Write to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Tick period, clamped to the accepted minimum
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs).max(timing::MIN_TICK_INTERVAL)
    }

    /// JPEG quality clamped to 1-100
    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality.clamp(1, 100)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs).max(timing::MIN_TIMEOUT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs).max(timing::MIN_TIMEOUT)
    }

    /// API key from the config, then from the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                inference::API_KEY_ENV_VARS
                    .iter()
                    .find_map(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }
}
