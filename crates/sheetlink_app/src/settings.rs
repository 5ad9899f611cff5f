use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use sheetlink_engine::{ConfigError, ServiceConfig};
use thiserror::Error;

pub const CONFIG_ENV: &str = "SHEETLINK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "./sheetlink.ron";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid log_level '{0}'")]
    LogLevel(String),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Where [`load`] found its config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

/// Contents of `sheetlink.ron`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub service: ServiceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
            service: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, SettingsError> {
        self.log_level
            .trim()
            .parse()
            .map_err(|_| SettingsError::LogLevel(self.log_level.clone()))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.level_filter()?;
        self.service.validate()?;
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Reads and validates the config; a missing file yields the defaults.
///
/// Runs before logging is set up, so it reports through its return value only.
pub fn load(path: &Path) -> Result<(AppConfig, ConfigSource), SettingsError> {
    let (config, source) = match fs::read_to_string(path) {
        Ok(text) => {
            let config = ron::from_str::<AppConfig>(&text).map_err(|source| {
                SettingsError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            (config, ConfigSource::File)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            (AppConfig::default(), ConfigSource::Defaults)
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    config.validate()?;
    Ok((config, source))
}
