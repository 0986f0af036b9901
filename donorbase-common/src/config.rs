//! Configuration loading and data directory resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "DONORBASE_DATA_DIR";

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "donorbase.db";

/// Contents of donorbase config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Data directory holding donorbase.db
    pub data_dir: Option<PathBuf>,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// HTTP bind settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5480
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Resolve the data directory following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. DONORBASE_DATA_DIR environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_dir(cli_arg: Option<&str>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(DATA_DIR_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config) = load_toml_config() {
        if let Some(data_dir) = config.data_dir {
            return data_dir;
        }
    }

    // Priority 4: OS-dependent compiled default
    default_data_dir()
}

/// Load the TOML config file, if one exists
pub fn load_toml_config() -> Result<TomlConfig> {
    let path = config_file_path()?;
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Server bind settings from the TOML config file, or defaults
pub fn load_server_config() -> ServerConfig {
    load_toml_config()
        .map(|c| c.server)
        .unwrap_or_default()
}

/// Full path to donorbase.db under the resolved data directory
pub fn database_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(DATABASE_FILE)
}

/// Locate the platform config file
fn config_file_path() -> Result<PathBuf> {
    let user_config = dirs::config_dir()
        .map(|d| d.join("donorbase").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if user_config.exists() {
        return Ok(user_config);
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/donorbase/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("donorbase"))
        .unwrap_or_else(|| PathBuf::from("./donorbase_data"))
}
