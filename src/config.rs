//! Server Configuration
//!
//! Defaults, overridable from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::game::tick::DEFAULT_TICK_RATE;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Where game state is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// SQLite database file.
    Sqlite(PathBuf),
    /// In-process maps; lost on exit.
    Memory,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Simulation rate (Hz).
    pub tick_rate: u32,
    /// Storage backend.
    pub storage: StorageConfig,
    /// Content document replacing the built-in tables.
    pub content_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 1000,
            tick_rate: DEFAULT_TICK_RATE,
            storage: StorageConfig::Sqlite(PathBuf::from("game.db")),
            content_path: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// `BIND_ADDR` wins over `PORT`. Values that fail to parse keep the
    /// default and log a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = parsed::<u16>(&lookup, "PORT") {
            config.bind_addr.set_port(port);
        }
        if let Some(addr) = parsed::<SocketAddr>(&lookup, "BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(max) = parsed::<usize>(&lookup, "MAX_CONNECTIONS") {
            config.max_connections = max;
        }
        if let Some(rate) = parsed::<u32>(&lookup, "TICK_RATE") {
            if rate == 0 {
                warn!("TICK_RATE must be positive, keeping {}", config.tick_rate);
            } else {
                config.tick_rate = rate;
            }
        }

        let db_path = lookup("DB_PATH").unwrap_or_else(|| "game.db".to_string());
        config.storage = match lookup("STORAGE").as_deref() {
            None | Some("sqlite") => StorageConfig::Sqlite(PathBuf::from(db_path)),
            Some("memory") => StorageConfig::Memory,
            Some(other) => {
                warn!("Unknown STORAGE value {:?}, using sqlite", other);
                StorageConfig::Sqlite(PathBuf::from(db_path))
            }
        };

        config.content_path = lookup("CONTENT_PATH").map(PathBuf::from);

        config
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.storage, StorageConfig::Sqlite(PathBuf::from("game.db")));
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "4000"),
            ("TICK_RATE", "30"),
            ("MAX_CONNECTIONS", "5"),
            ("STORAGE", "memory"),
            ("CONTENT_PATH", "/tmp/content.json"),
        ]));
        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.content_path, Some(PathBuf::from("/tmp/content.json")));
    }

    #[test]
    fn test_bind_addr_wins_over_port() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "4000"),
            ("BIND_ADDR", "127.0.0.1:5000"),
        ]));
        assert_eq!(config.bind_addr, "127.0.0.1:5000".parse().unwrap());
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("TICK_RATE", "0"),
            ("STORAGE", "redis"),
            ("DB_PATH", "other.db"),
        ]));
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.storage, StorageConfig::Sqlite(PathBuf::from("other.db")));
    }
}
