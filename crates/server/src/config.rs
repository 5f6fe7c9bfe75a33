//! Server configuration (loaded from sluice.toml).

use serde::Deserialize;
use sluice_auth::ResourceAuth;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub rate_limiting: RateLimitSection,
    pub transfers: TransferSection,
    /// Resource access rules and provider mounts, keyed by resource id.
    pub resources: HashMap<String, ResourceAuth>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address (default: 127.0.0.1)
    pub host: String,
    /// Bind port (default: 7777)
    pub port: u16,
    /// Public base URL used to build entity links
    pub domain: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 7777, domain: "http://localhost:7777".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    pub enabled: bool,
    /// Requests allowed per window (default: 3600)
    pub limit: u64,
    /// Window length in seconds (default: 3600)
    pub window_seconds: u64,
    /// SQLite counter store path; omitted means in-process counters
    pub store_path: Option<PathBuf>,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self { enabled: false, limit: 3600, window_seconds: 3600, store_path: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransferSection {
    /// Abort cross-provider transfers after this much inactivity
    pub inactivity_timeout_seconds: u64,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self { inactivity_timeout_seconds: 600 }
    }
}

impl ServerConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse config from a TOML string.
    pub fn parse(raw: &str) -> std::io::Result<Self> {
        toml::from_str(raw).map_err(std::io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse("").unwrap();
        assert_eq!(config.server.port, 7777);
        assert!(!config.rate_limiting.enabled);
        assert_eq!(config.rate_limiting.limit, 3600);
        assert_eq!(config.transfers.inactivity_timeout_seconds, 600);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn test_full_config_parses() {
        let raw = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            domain = "https://files.example.org"

            [rate_limiting]
            enabled = true
            limit = 120
            window_seconds = 60
            store_path = "/var/lib/sluice/limits.db"

            [resources.proj1]
            token = "secret"
            view_only = "peek"

            [resources.proj1.providers.filesystem]
            settings = { folder = "/srv/proj1" }

            [resources.proj1.providers.memory]
            settings = { mount = "proj1" }
        "#;
        let config = ServerConfig::parse(raw).unwrap();
        assert_eq!(config.server.domain, "https://files.example.org");
        assert!(config.rate_limiting.enabled);
        assert_eq!(config.rate_limiting.window_seconds, 60);
        let resource = &config.resources["proj1"];
        assert_eq!(resource.token.as_deref(), Some("secret"));
        assert_eq!(resource.providers["filesystem"].settings["folder"], "/srv/proj1");
    }
}
