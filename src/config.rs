//! Server configuration
//!
//! Defaults, an optional TOML file, and CLI overrides, applied in that
//! order: file values replace defaults, flags win over the file.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Whether to run the geoiplookup helper for new connections
    pub geoip: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            geoip: true,
        }
    }
}

impl ServerConfig {
    /// CLI flags take precedence over file values
    pub fn apply_overrides(&mut self, bind: Option<String>, port: Option<u16>) {
        if let Some(bind) = bind {
            self.bind = bind;
        }
        if let Some(port) = port {
            self.port = port;
        }
    }
}

/// Load configuration, from the given TOML file if there is one.
pub async fn load(path: Option<&Path>) -> Result<ServerConfig> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path).await.map_err(|error| {
                Error::Config(format!("cannot read {}: {error}", path.display()))
            })?;
            Ok(toml::from_str(&content)?)
        }
        None => Ok(ServerConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.geoip);
    }

    #[tokio::test]
    async fn missing_path_yields_defaults() {
        let config = load(None).await.unwrap();
        assert_eq!(config.port, 3000);
    }

    #[tokio::test]
    async fn file_values_replace_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8080\ngeoip = false").unwrap();

        let config = load(Some(file.path())).await.unwrap();
        assert_eq!(config.port, 8080);
        assert!(!config.geoip);
        // unset fields keep their defaults
        assert_eq!(config.bind, "0.0.0.0");
    }

    #[tokio::test]
    async fn unreadable_file_is_a_config_error() {
        let result = load(Some(Path::new("/nonexistent/nettoolbox.toml"))).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn flags_win_over_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8080").unwrap();

        let mut config = load(Some(file.path())).await.unwrap();
        config.apply_overrides(Some("127.0.0.1".to_string()), Some(9090));
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.port, 9090);
    }
}
