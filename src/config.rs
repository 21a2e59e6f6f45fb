// src/config.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_CONFIG_DIR: &str = "workout-tracker";
const CONFIG_ENV_VAR: &str = "WORKOUT_TRACKER_CONFIG_DIR"; // Environment variable name
const DEFAULT_STORAGE_KEY: &str = "workout-storage";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("Could not determine data directory.")]
    CannotDetermineDataDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Storage key cannot be empty.")]
    EmptyStorageKey,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Config {
    pub data_dir: Option<PathBuf>,   // None = platform data dir
    pub storage_key: String,         // Key the workout document is stored under
    pub export_dir: Option<PathBuf>, // None = data dir
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            export_dir: None,
        }
    }
}

impl Config {
    /// Directory holding the database, falling back to the platform data dir.
    /// # Errors
    /// Returns `ConfigError::CannotDetermineDataDir` if no platform dir exists.
    pub fn resolved_data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_CONFIG_DIR))
                .ok_or(ConfigError::CannotDetermineDataDir),
        }
    }

    /// # Errors
    /// Returns `ConfigError::CannotDetermineDataDir` if no platform dir exists.
    pub fn resolved_export_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.export_dir {
            Some(dir) => Ok(dir.clone()),
            None => self.resolved_data_dir().map(|dir| dir.join("exports")),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::EmptyStorageKey);
        }
        Ok(())
    }
}

/// Determines the path to the configuration file.
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir_path = if let Some(path_str) = std::env::var_os(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            warn!(
                var = CONFIG_ENV_VAR,
                path = %path.display(),
                "Config override is not a directory, trying to create it"
            );
            fs::create_dir_all(&path)?;
        }
        path
    } else {
        let base_config_dir = dirs::config_dir().ok_or(ConfigError::CannotDetermineConfigDir)?;
        base_config_dir.join(APP_CONFIG_DIR)
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from the TOML file at the given path, writing the
/// defaults there first if the file does not exist yet.
pub fn load_config(config_path: &Path) -> Result<Config, ConfigError> {
    if config_path.exists() {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content).map_err(ConfigError::TomlParse)?;
        config.validate()?;
        Ok(config)
    } else {
        let default_config = Config::default();
        save_config(config_path, &default_config)?;
        Ok(default_config)
    }
}

/// Saves the configuration to the TOML file.
pub fn save_config(config_path: &Path, config: &Config) -> Result<(), ConfigError> {
    config.validate()?;
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config).map_err(ConfigError::TomlSerialize)?;
    fs::write(config_path, config_content)?;
    Ok(())
}
