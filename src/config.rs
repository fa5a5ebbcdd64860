//! TOML configuration shared by the CLI and the dashboard.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::DEFAULT_TOP_N;
use crate::strategy::DEFAULT_THRESHOLD;

/// Environment variable overriding the ratings database path.
pub const DB_PATH_ENV: &str = "AFFINITY_DB_PATH";
/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "AFFINITY_CONFIG";

const DEFAULT_DB_PATH: &str = "data/recommendation_system.db";
const DEFAULT_TITLE: &str = "Recommendation Insights";
const DEFAULT_PORT: u16 = 8501;

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Ratings store settings.
    #[serde(default)]
    pub database: DatabaseSection,
    /// Dashboard server settings.
    #[serde(default)]
    pub dashboard: DashboardSection,
    /// Query defaults.
    #[serde(default)]
    pub recommend: RecommendSection,
    /// Prescriptive table settings.
    #[serde(default)]
    pub strategy: StrategySection,
}

/// `[database]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite file holding the `ratings` table.
    pub path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
        }
    }
}

/// `[dashboard]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardSection {
    /// Page title.
    pub title: String,
    /// Bind address.
    pub host: IpAddr,
    /// Bind port.
    pub port: u16,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

/// `[recommend]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecommendSection {
    /// Recommendations returned per query by default.
    pub top_n: usize,
}

impl Default for RecommendSection {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// `[strategy]`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategySection {
    /// Lower bound of the middle strategy tier.
    pub threshold: f64,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Errors raised while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// Serializing the config failed.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying error.
        source: toml::ser::Error,
    },
    /// Writing the config file failed.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Creating the config directory failed.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// A setting is out of range.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Dotted key of the setting.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// No explicit path and no platform config directory.
    #[error("no config directory found; pass --config or set AFFINITY_CONFIG")]
    NoConfigPath,
}

impl AppConfig {
    /// Loads `explicit` (or the default location) and applies environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(explicit)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Loads a file without consulting the environment.
    pub fn load_file(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        match explicit.or_else(default_config_path) {
            Some(path) if path.exists() => read_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Applies overrides looked up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(DB_PATH_ENV).filter(|value| !value.trim().is_empty()) {
            self.database.path = PathBuf::from(path);
        }
    }

    /// Checks ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recommend.top_n == 0 {
            return Err(ConfigError::Invalid {
                key: "recommend.top_n",
                reason: "must be at least 1".into(),
            });
        }
        let threshold = self.strategy.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "strategy.threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        Ok(())
    }

    /// Renders the config as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }

    /// Writes the config to `explicit` or the default location, returning the path.
    pub fn persist(&self, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let target = match explicit {
            Some(path) => path.to_path_buf(),
            None => default_config_path().ok_or(ConfigError::NoConfigPath)?,
        };
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let serialized = self.to_toml()?;
        fs::write(&target, serialized).map_err(|source| ConfigError::Write {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Platform default config location, e.g. `~/.config/affinity/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("affinity").join("config.toml"))
}
