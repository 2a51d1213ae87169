//! Configuration schema for lightrun
//!
//! Configuration is stored at `~/.config/lightrun/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Binary cache settings
    pub cache: CacheConfig,

    /// Script runtime settings
    pub runtime: RuntimeConfig,

    /// Shell fallback settings
    pub shell: ShellConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Binary accessibility cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist enumerated binaries between invocations (default: true)
    pub enabled: bool,

    /// Cache directory (defaults to `<tmp>/lightrun-cache`)
    pub directory: Option<PathBuf>,

    /// Seconds to wait for another process holding the cache lock
    pub lock_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            lock_timeout_secs: 30,
        }
    }
}

/// Runtime used to launch JavaScript binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interpreter name or path
    pub interpreter: String,

    /// Dependency-resolution metadata file, relative to the project root
    pub pnp_file: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: "node".to_string(),
            pnp_file: ".pnp.js".to_string(),
        }
    }
}

/// Shell fallback configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Command interpreter override (defaults to /bin/sh or %ComSpec%)
    pub program: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[runtime]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.runtime.interpreter, "node");
        assert!(config.cache.enabled);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [runtime]
            interpreter = "/opt/node/bin/node"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.runtime.interpreter, "/opt/node/bin/node");
        assert_eq!(config.runtime.pnp_file, ".pnp.js"); // default preserved
        assert_eq!(config.cache.lock_timeout_secs, 30);
    }
}
