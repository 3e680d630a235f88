//! Runtime configuration, loaded from a JSON file.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the
//! keys it wants to change:
//!
//! ```json
//! { "api": { "base_url": "http://10.0.0.5:8000" }, "breath": { "gamma": 0.6 } }
//! ```

use std::path::{Path, PathBuf};

use lumina_logic::breath::BreathConfig;
use lumina_logic::coverage::{BrushLimits, DEFAULT_BRUSH_RADIUS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{resolve_store_path, DEFAULT_STORE_FILE};

/// Environment variable overriding [`ApiConfig::base_url`].
pub const API_URL_ENV: &str = "LUMINA_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LuminaConfig {
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub breath: BreathConfig,
    pub painting: PaintSettings,
}

/// Where the progress document lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Used when it can be created and written to.
    pub preferred_dir: Option<PathBuf>,
    pub fallback_dir: PathBuf,
    pub file_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            preferred_dir: None,
            fallback_dir: PathBuf::from("."),
            file_name: DEFAULT_STORE_FILE.to_string(),
        }
    }
}

/// Breathing-metrics endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// When false the painter runs at the base rate with the gate open.
    pub enabled: bool,
    pub base_url: String,
    pub volume_path: String,
    pub regularity_path: String,
    pub rate_path: String,
    pub poll_interval_ms: u64,
    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:8000".to_string(),
            volume_path: "/webhooks/breathing-volume".to_string(),
            regularity_path: "/webhooks/breathing-regularity".to_string(),
            rate_path: "/webhooks/breathing-rate".to_string(),
            poll_interval_ms: 100,
            timeout_ms: 2_000,
        }
    }
}

/// Brush and fill-speed settings for a painting session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintSettings {
    /// Seconds per cell at multiplier 1.
    pub base_seconds_per_cell: f32,
    pub brush_radius: f32,
    pub brush_limits: BrushLimits,
}

impl Default for PaintSettings {
    fn default() -> Self {
        Self {
            base_seconds_per_cell: 1.5,
            brush_radius: DEFAULT_BRUSH_RADIUS,
            brush_limits: BrushLimits::default(),
        }
    }
}

impl LuminaConfig {
    /// Parse a config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a config file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json_str(&json)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api.base_url = url;
            }
        }
    }

    /// Resolved location of the progress document.
    pub fn store_path(&self) -> PathBuf {
        resolve_store_path(
            self.store.preferred_dir.as_deref(),
            &self.store.fallback_dir,
            &self.store.file_name,
        )
    }
}
