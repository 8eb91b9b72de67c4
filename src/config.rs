use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::http::parser::DEFAULT_MAX_REQUEST_BYTES;

/// Top-level configuration file layout.
///
/// ```yaml
/// server:
///   host: 0.0.0.0
///   port: 8080
///   idle_timeout_secs: 120
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Connections quiet for longer than this are closed
    pub idle_timeout_secs: u64,
    /// How often idle connections are looked for
    pub sweep_interval_secs: u64,
    /// Largest request (head and body) a connection will buffer
    pub max_request_bytes: usize,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            idle_timeout_secs: 120,
            sweep_interval_secs: 60,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            max_connections: 1024,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Built-in defaults.
    pub fn load() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("invalid configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&yaml)
            .with_context(|| format!("failed to load config file {}", path.display()))
    }
}
