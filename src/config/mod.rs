//! Configuration loading and validation.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::TagPreference;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// A settings value rejected at the boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Invalid match history tag: {0}")]
    InvalidTag(String),
}

pub const MIN_CONCURRENCY: usize = 1;
pub const MIN_LOAD_COUNT: u32 = 1;
pub const MAX_LOAD_COUNT: u32 = 200;
pub const MIN_PREMADE_THRESHOLD: u32 = 3;

/// User-facing engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OngoingGameSettings {
    /// Shared concurrency limit of both scheduler pools
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Games per player to load (1..=200)
    #[serde(default = "default_load_count")]
    pub match_history_load_count: u32,

    /// Minimum shared games before players count as premade (>= 3)
    #[serde(default = "default_premade_threshold")]
    pub premade_team_threshold: u32,

    /// Prefer the auxiliary backend for match history when it supports the server
    #[serde(default = "default_use_auxiliary")]
    pub use_auxiliary_backend: bool,

    #[serde(default)]
    pub tag_preference: TagPreference,
}

fn default_concurrency() -> usize {
    10
}

fn default_enabled() -> bool {
    true
}

fn default_load_count() -> u32 {
    20
}

fn default_premade_threshold() -> u32 {
    3
}

fn default_use_auxiliary() -> bool {
    true
}

impl Default for OngoingGameSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            enabled: default_enabled(),
            match_history_load_count: default_load_count(),
            premade_team_threshold: default_premade_threshold(),
            use_auxiliary_backend: default_use_auxiliary(),
            tag_preference: TagPreference::default(),
        }
    }
}

impl OngoingGameSettings {
    pub fn check_concurrency(value: usize) -> Result<usize, SettingsError> {
        if value >= MIN_CONCURRENCY {
            Ok(value)
        } else {
            Err(SettingsError::OutOfRange {
                field: "concurrency",
                value: value as i64,
                min: MIN_CONCURRENCY as i64,
                max: i64::MAX,
            })
        }
    }

    pub fn check_load_count(value: u32) -> Result<u32, SettingsError> {
        if (MIN_LOAD_COUNT..=MAX_LOAD_COUNT).contains(&value) {
            Ok(value)
        } else {
            Err(SettingsError::OutOfRange {
                field: "match_history_load_count",
                value: value as i64,
                min: MIN_LOAD_COUNT as i64,
                max: MAX_LOAD_COUNT as i64,
            })
        }
    }

    pub fn check_premade_threshold(value: u32) -> Result<u32, SettingsError> {
        if value >= MIN_PREMADE_THRESHOLD {
            Ok(value)
        } else {
            Err(SettingsError::OutOfRange {
                field: "premade_team_threshold",
                value: value as i64,
                min: MIN_PREMADE_THRESHOLD as i64,
                max: i64::from(u32::MAX),
            })
        }
    }

    /// Validate every bounded field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        Self::check_concurrency(self.concurrency)?;
        Self::check_load_count(self.match_history_load_count)?;
        Self::check_premade_threshold(self.premade_team_threshold)?;
        Ok(())
    }
}

/// Local client API (primary backend) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// e.g. `https://127.0.0.1:53412`
    #[serde(default)]
    pub base_url: Option<Url>,

    /// Password of the `riot` basic-auth user
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    15
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            password: None,
            timeout_seconds: default_timeout(),
        }
    }
}

/// Cross-region data API (auxiliary backend) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxiliaryConfig {
    /// Platform id -> base URL. Servers not listed here are unsupported.
    #[serde(default)]
    pub servers: BTreeMap<String, Url>,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AuxiliaryConfig {
    fn default() -> Self {
        Self {
            servers: BTreeMap::new(),
            access_token: None,
            timeout_seconds: default_timeout(),
        }
    }
}

/// Saved-player store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPlayersConfig {
    #[serde(default = "default_saved_players_path")]
    pub path: PathBuf,
}

fn default_saved_players_path() -> PathBuf {
    PathBuf::from("./data/saved_players.jsonl")
}

impl Default for SavedPlayersConfig {
    fn default() -> Self {
        Self {
            path: default_saved_players_path(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Session polling interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub settings: OngoingGameSettings,

    #[serde(default)]
    pub primary: PrimaryConfig,

    #[serde(default)]
    pub auxiliary: AuxiliaryConfig,

    #[serde(default)]
    pub saved_players: SavedPlayersConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval(),
            settings: OngoingGameSettings::default(),
            primary: PrimaryConfig::default(),
            auxiliary: AuxiliaryConfig::default(),
            saved_players: SavedPlayersConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.primary.timeout_seconds == 0 || self.auxiliary.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Backend timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
