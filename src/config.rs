//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server information.
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
    /// Channel engine tunables.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Per-channel flood governor tunables.
    #[serde(default)]
    pub flood: FloodConfig,
    /// Split-mode sentinel tunables.
    #[serde(default)]
    pub split: SplitConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "irc.tern.net").
    pub name: String,
    /// Network name (e.g., "Tern").
    pub network: String,
    /// Server ID for TS6 (3 characters).
    pub sid: String,
    /// Server description.
    pub description: String,
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:6667").
    pub address: SocketAddr,
}

/// Channel engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum entries per ban-family list (+b/+e/+I/+q each).
    pub max_list_size: usize,
    /// Maximum mode parameters carried on one wire line.
    pub max_modes_per_line: usize,
    /// Whether ban exceptions (+e) are honored at all.
    pub use_exceptions: bool,
    /// Reserved channel-name masks; matching channels refuse messages from
    /// local unprivileged senders.
    pub resv: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_list_size: 100,
            max_modes_per_line: 4,
            use_exceptions: true,
            resv: Vec::new(),
        }
    }
}

/// Flood governor configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Counter value at which a channel is considered flooding.
    pub threshold: i64,
    /// Penalty added to the counter on the first crossing, to discourage
    /// an immediate retry.
    pub penalty: i64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self { threshold: 5, penalty: 6 }
    }
}

/// Split-mode sentinel configuration.
///
/// Both floors default to zero, so a standalone server never considers
/// itself split; networked deployments raise them.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Minimum count of burst-complete servers before split-mode engages.
    pub min_servers: u32,
    /// Minimum visible user count before split-mode engages.
    pub min_users: u32,
    /// Refuse creation of new channels while split-mode is active.
    pub no_create: bool,
    /// Refuse all channel joins while split-mode is active.
    pub no_join: bool,
    /// Re-check interval in seconds while split-mode is suspected.
    pub recheck_secs: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            min_servers: 0,
            min_users: 0,
            no_create: true,
            no_join: false,
            recheck_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[server]
name = "irc.tern.test"
network = "Tern"
sid = "1AB"
description = "test server"

[listen]
address = "127.0.0.1:6667"
"#;

    #[test]
    fn test_load_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.sid, "1AB");
        assert_eq!(config.channel.max_modes_per_line, 4);
        assert_eq!(config.flood.threshold, 5);
        assert!(config.split.no_create);
    }

    #[test]
    fn test_load_with_engine_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{MINIMAL}\n[flood]\nthreshold = 12\n\n[split]\nmin_servers = 4\nno_join = true\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.flood.threshold, 12);
        assert_eq!(config.flood.penalty, 6);
        assert_eq!(config.split.min_servers, 4);
        assert!(config.split.no_join);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/ternd.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
