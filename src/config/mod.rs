//! Configuration module
//!
//! Handles loading and saving Waypoint configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::NetworkConfig as NetConfig;
use crate::protocol::DEFAULT_PORT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Location and route data files
    #[serde(default)]
    pub data: DataConfig,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port to listen on or connect to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Interface the server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Connection timeout in ms
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Read timeout in ms (default: wait forever)
    pub read_timeout_ms: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: None,
        }
    }
}

/// Data file configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataConfig {
    /// Locations CSV file (`name, cost` per line)
    pub locations: Option<PathBuf>,
    /// Routes CSV file (`start, destination, ...` per line)
    pub routes: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("waypoint/config.toml")),
            Some(PathBuf::from("./waypoint.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading configuration from {}", path.display());
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Network settings for the endpoints, with `port` overriding the file
    pub fn net_config(&self, port: Option<u16>) -> NetConfig {
        let mut config = NetConfig::new(port.unwrap_or(self.network.port))
            .with_bind_address(self.network.bind_address.clone())
            .with_read_timeout_ms(self.network.read_timeout_ms);
        config.connect_timeout_ms = self.network.connect_timeout_ms;
        config
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        network: NetworkConfig {
            read_timeout_ms: Some(30_000),
            ..Default::default()
        },
        data: DataConfig {
            locations: Some(PathBuf::from("data/locations.csv")),
            routes: Some(PathBuf::from("data/routes.csv")),
        },
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
