//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::errors::ConfigError;

/// Host configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostConfig {
    pub host: HostSection,
    pub modules: ModulesConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostSection {
    pub name: String,
    /// Prefix for operator console commands
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModulesConfig {
    /// Directory searched for native modules
    pub directory: PathBuf,
    /// Default startup load list, used until the System store has its own
    #[serde(default)]
    pub autoload: Vec<String>,
}

/// Which configuration store backs the System module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreDriver {
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    pub driver: StoreDriver,
    pub path: PathBuf,
    /// Table name for the sqlite driver
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "config".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: HostSection {
                name: "sans-bot".to_string(),
                prefix: "!".to_string(),
            },
            modules: ModulesConfig {
                directory: PathBuf::from("./modules"),
                autoload: Vec::new(),
            },
            store: StoreConfig {
                driver: StoreDriver::File,
                path: PathBuf::from("system.yaml"),
                table: default_table(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl HostConfig {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to render config: {}", e)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.name.trim().is_empty() {
            return Err(ConfigError::MissingField("host.name".to_string()));
        }
        if self.store.driver != StoreDriver::Memory && self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("store.path".to_string()));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "logging.level: {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Apply environment overrides on top of this config
    pub fn with_env(mut self) -> Self {
        if let Ok(dir) = std::env::var("SANS_MODULES_DIR") {
            self.modules.directory = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("SANS_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(path) = std::env::var("SANS_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }

        self
    }

    pub fn load_env() -> Self {
        Self::default().with_env()
    }
}
