//! Engine configuration.
//!
//! T010: Implement Config loading from TOML

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Leaderboard settings
    pub leaderboard: LeaderboardSettings,
    /// Trend chart settings
    pub charts: ChartSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            leaderboard: LeaderboardSettings::default(),
            charts: ChartSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("athletest.db")
    }
}

/// Leaderboard-related settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardSettings {
    /// Default page size when the caller passes none
    pub default_page_size: usize,
    /// How many user IDs to resolve per directory lookup
    pub display_batch_size: usize,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            display_batch_size: 100,
        }
    }
}

/// Trend chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSettings {
    /// Span of one chart bucket in days
    pub bucket_days: i64,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self { bucket_days: 30 }
    }
}

/// Get the engine data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "athletest", "Athletest")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load engine configuration from file.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
    let path = get_config_path();

    if !path.exists() {
        let config = EngineConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: EngineConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save engine configuration to file.
pub fn save_config(config: &EngineConfig) -> Result<(), ConfigError> {
    let path = get_config_path();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
