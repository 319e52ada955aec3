//! Server configuration, loaded from TOML.
//!
//! ```toml
//! address = "0.0.0.0:8080"
//! log_level = "debug"
//!
//! [cors]
//! origins = ["example.com"]
//! headers = ["content-type"]
//! allow_credentials = true
//!
//! [static_files]
//! root = "./public"
//! excludes = ['\.DS_Store$']
//!
//! [pool]
//! min = 1
//! max = 4
//! ```

use crate::assets::StaticOptions;
use crate::error::ConfigError;
use micro_pool::PoolOptions;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use tracing::Level;

const DEFAULT_ADDRESS: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub log_level: String,
    pub cors: Option<CorsOptions>,
    pub static_files: Option<StaticOptions>,
    pub pool: PoolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_owned(),
            log_level: "info".to_owned(),
            cors: None,
            static_files: None,
            pool: PoolConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        content.parse()
    }

    pub fn socket_address(&self) -> Result<SocketAddr, ConfigError> {
        self.address.parse().map_err(|_invalid| ConfigError::InvalidAddress { address: self.address.clone() })
    }

    /// The configured log level, `INFO` when it is not a level name.
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

impl FromStr for ServerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Which cross-origin callers are allowed; `"any"` or `"*"` in `origins` allows every origin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsOptions {
    pub origins: Vec<String>,
    pub headers: Vec<String>,
    pub allow_credentials: bool,
}

/// Bounds of the worker pool computing static asset variants.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min: usize,
    pub max: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let PoolOptions { min, max } = PoolOptions::default();
        Self { min, max }
    }
}

impl From<PoolConfig> for PoolOptions {
    fn from(config: PoolConfig) -> Self {
        PoolOptions::new(config.min, config.max)
    }
}
