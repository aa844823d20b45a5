use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use checkin_core::scanning::domain::scanner_config::ScannerConfig;
use checkin_core::shared::constants::{
    DEFAULT_COOLDOWN, DEFAULT_SCAN_INTERVAL, DEFAULT_UTC_OFFSET_SECS,
};

const APP_DIR: &str = "QR Checkin";
pub const REST_URL_VAR: &str = "CHECKIN_REST_URL";
pub const REST_KEY_VAR: &str = "CHECKIN_REST_KEY";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("UTC offset out of range: {0} seconds")]
    InvalidOffset(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Local,
    Rest,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Local => write!(f, "local"),
            StoreBackend::Rest => write!(f, "rest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub backend: StoreBackend,
    pub rest_url: Option<String>,
    pub rest_key: Option<String>,
    pub store_path: Option<PathBuf>,
    pub cooldown_ms: u64,
    pub scan_interval_ms: u64,
    pub utc_offset_secs: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Local,
            rest_url: None,
            rest_key: None,
            store_path: None,
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL.as_millis() as u64,
            utc_offset_secs: DEFAULT_UTC_OFFSET_SECS,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("settings.json"))
    }

    /// Loads the user's settings with environment overrides applied.
    ///
    /// A missing or unreadable file falls back to defaults.
    pub fn load() -> Self {
        let settings = match Self::config_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("Ignoring settings at {}: {e}", path.display());
                Self::default()
            }),
            None => Self::default(),
        };
        settings.with_env_overrides(|name| env::var(name).ok())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)
    }

    /// Non-empty values from `lookup` replace the REST url and key.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v: &String| !v.trim().is_empty());
        if let Some(url) = non_empty(REST_URL_VAR) {
            self.rest_url = Some(url);
        }
        if let Some(key) = non_empty(REST_KEY_VAR) {
            self.rest_key = Some(key);
        }
        self
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig::default()
            .with_cooldown(std::time::Duration::from_millis(self.cooldown_ms))
            .with_scan_interval(std::time::Duration::from_millis(self.scan_interval_ms))
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, SettingsError> {
        FixedOffset::east_opt(self.utc_offset_secs)
            .ok_or(SettingsError::InvalidOffset(self.utc_offset_secs))
    }

    /// Local store file: the configured path or one under the user data dir.
    pub fn local_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("attendance.json")
        })
    }
}
