//! Configuration loading and resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`~/.config/ppc/config.toml`, then `/etc/ppc/config.toml`)
//! 4. Compiled default (fallback)

use serde::Deserialize;
use std::path::PathBuf;

use crate::{Error, Result};

/// Default bind host for the coordination service
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port for the coordination service
pub const DEFAULT_PORT: u16 = 5810;

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<String>,
    pub engine_base_url: Option<String>,
    pub engine_timeout_ms: Option<u64>,
}

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct CoordConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Base URL of the external workflow engine. Absent means session-open
    /// and mapping dispatch fail with a configuration error.
    pub engine_base_url: Option<String>,
    pub engine_timeout_ms: u64,
}

/// Command-line overrides, already parsed by the binary
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_path: Option<String>,
    pub engine_base_url: Option<String>,
}

impl CoordConfig {
    /// Resolve the full configuration from CLI > env > file > defaults.
    pub fn resolve(cli: CliOverrides) -> Result<Self> {
        let file = load_config_file().unwrap_or_default();

        let host = cli
            .host
            .or_else(|| std::env::var("PPC_HOST").ok())
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match cli.port {
            Some(p) => p,
            None => match std::env::var("PPC_PORT") {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid PPC_PORT value: {:?}", raw)))?,
                Err(_) => file.port.unwrap_or(DEFAULT_PORT),
            },
        };

        let database_path = cli
            .database_path
            .or_else(|| std::env::var("PPC_DATABASE").ok())
            .or(file.database_path)
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let engine_base_url = cli
            .engine_base_url
            .or_else(|| std::env::var("PPC_ENGINE_URL").ok())
            .or(file.engine_base_url);

        let engine_timeout_ms = match std::env::var("PPC_ENGINE_TIMEOUT_MS") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::Config(format!("Invalid PPC_ENGINE_TIMEOUT_MS value: {:?}", raw))
            })?,
            Err(_) => file.engine_timeout_ms.unwrap_or(15_000),
        };

        Ok(Self {
            host,
            port,
            database_path,
            engine_base_url,
            engine_timeout_ms,
        })
    }

    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load and parse the config file if one exists
fn load_config_file() -> Result<ConfigFile> {
    let path = find_config_file()?;
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Locate the platform config file, preferring the user's config dir
fn find_config_file() -> Result<PathBuf> {
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("ppc").join("config.toml")) {
        if user_config.exists() {
            return Ok(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/ppc/config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ppc").join("ppc.db"))
        .unwrap_or_else(|| PathBuf::from("./ppc_data/ppc.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_overrides() {
        let config = CoordConfig::resolve(CliOverrides::default()).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.engine_timeout_ms, 15_000);
    }

    #[test]
    fn test_cli_overrides_win() {
        let config = CoordConfig::resolve(CliOverrides {
            host: Some("0.0.0.0".to_string()),
            port: Some(9000),
            database_path: Some("/tmp/test.db".to_string()),
            engine_base_url: Some("http://engine.local".to_string()),
        })
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.database_path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.engine_base_url.as_deref(), Some("http://engine.local"));
    }

    #[test]
    fn test_bind_addr_formatting() {
        let config = CoordConfig::resolve(CliOverrides {
            host: Some("127.0.0.1".to_string()),
            port: Some(5810),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:5810");
    }
}
