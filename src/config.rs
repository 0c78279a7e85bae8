//! Configuration loading
//!
//! Reads `~/.config/formfill/config.toml`. A missing file yields defaults; an
//! unreadable or invalid file yields defaults plus a warning for the caller.

mod types;

use std::fs;
use std::path::{Path, PathBuf};

pub use types::{
    BridgeConfig, Config, KeyboardConfig, LogConfig, LogLevel, MIN_URL_POLL_INTERVAL_MS,
    StoreConfig, SuggestionsConfig,
};

const CONFIG_DIR: &str = "formfill";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "suggestions.db";

/// Loaded configuration plus an optional warning about why defaults were used
#[derive(Debug, Clone)]
pub struct ConfigResult {
    pub config: Config,
    pub warning: Option<String>,
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".config").join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Default database location under the platform data directory
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join(CONFIG_DIR).join(DATABASE_FILE))
}

pub fn load_config() -> ConfigResult {
    match config_path() {
        Some(path) => load_config_from_path(&path),
        None => ConfigResult {
            config: Config::default(),
            warning: None,
        },
    }
}

pub fn load_config_from_path(path: &Path) -> ConfigResult {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ConfigResult {
                config: Config::default(),
                warning: None,
            };
        }
        Err(e) => {
            return ConfigResult {
                config: Config::default(),
                warning: Some(format!("Failed to read {}: {}", path.display(), e)),
            };
        }
    };

    match parse_config(&contents) {
        Ok(config) => ConfigResult {
            config,
            warning: None,
        },
        Err(e) => ConfigResult {
            config: Config::default(),
            warning: Some(format!("Invalid config {}: {}", path.display(), e)),
        },
    }
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

impl Config {
    /// Database path from `[store] path`, else the platform default
    pub fn database_path(&self) -> Option<PathBuf> {
        self.store.path.clone().or_else(default_database_path)
    }
}
