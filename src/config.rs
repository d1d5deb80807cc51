//! Service configuration
//!
//! Layered with figment: built-in defaults, then a TOML file, then
//! `LABGATE_*` environment variables. Command-line flags are applied on top
//! by the binary.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// TOML file read when no explicit path is given, if it exists
pub const DEFAULT_CONFIG_FILE: &str = "labgate.toml";

/// Prefix for environment overrides, e.g. `LABGATE_BIND_ADDR`
pub const ENV_PREFIX: &str = "LABGATE_";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    /// Allow any origin to call the API (browser front-ends on other hosts)
    pub cors_permissive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_format: LogFormat::Text,
            cors_permissive: false,
        }
    }
}

impl Config {
    /// Load configuration. An explicit `path` must exist; without one,
    /// `labgate.toml` in the working directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found: {}", path.display());
                }
                path
            }
            None => Path::new(DEFAULT_CONFIG_FILE),
        };

        Self::figment(file)
            .extract()
            .with_context(|| format!("Invalid configuration in {}", file.display()))
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
    }
}
