//! Server settings.
//!
//! Settings are loaded from a TOML file with flat keys. Every key has a
//! default, so an empty file yields a usable configuration:
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 9090
//! results_path = "resultados.dat"
//! max_sessions = 32
//! stream_frames = false
//! frame_interval_ms = 100
//! users = "ana:uno,bob:dos"
//! ```

use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Keys `ServerConfig` understands; anything else is logged and ignored.
const KNOWN_KEYS: &[&str] = &[
    "host",
    "port",
    "results_path",
    "max_sessions",
    "stream_frames",
    "frame_interval_ms",
    "users",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub results_path: PathBuf,
    pub max_sessions: usize,
    /// Stream encoded board snapshots on the frame channel.
    pub stream_frames: bool,
    #[serde(rename = "frame_interval_ms", deserialize_with = "millis")]
    pub frame_interval: Duration,
    /// `user:password` pairs, comma separated.
    pub users: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9090,
            results_path: PathBuf::from("resultados.dat"),
            max_sessions: 32,
            stream_frames: false,
            frame_interval: Duration::from_millis(100),
            users: String::new(),
        }
    }
}

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl ServerConfig {
    /// Reads and parses a TOML settings file.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses TOML text over the defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        for key in table.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!("Unknown config key '{}'", key);
            }
        }

        let config: ServerConfig = toml::Value::Table(table).try_into()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_sessions".to_string(),
                value: "0".to_string(),
            });
        }
        if self.frame_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "frame_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 9090);
        assert_eq!(config.results_path, PathBuf::from("resultados.dat"));
        assert_eq!(config.bind_address(), "127.0.0.1:9090");
        assert!(!config.stream_frames);
    }

    #[test]
    fn test_empty_source_is_default() {
        assert_eq!(ServerConfig::from_toml("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
# server settings
port = 8888
results_path = "/tmp/scores.dat"
max_sessions = 4
stream_frames = true
frame_interval_ms = 250
users = "ana:uno,bob:dos"
db_url = "ignored"
"#;
        let config = ServerConfig::from_toml(text).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8888);
        assert_eq!(config.results_path, PathBuf::from("/tmp/scores.dat"));
        assert_eq!(config.max_sessions, 4);
        assert!(config.stream_frames);
        assert_eq!(config.frame_interval, Duration::from_millis(250));
        assert_eq!(config.users, "ana:uno,bob:dos");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            ServerConfig::from_toml("port = \"abc\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml("port = 70000"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml("stream_frames = \"maybe\""),
            Err(ConfigError::Parse(_))
        ));

        match ServerConfig::from_toml("frame_interval_ms = 0") {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "frame_interval_ms");
                assert_eq!(value, "0");
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
        assert!(matches!(
            ServerConfig::from_toml("max_sessions = 0"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        assert!(matches!(
            ServerConfig::from_toml("just some words"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = 1234\nstream_frames = true").unwrap();

        let config = ServerConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(config.port, 1234);
        assert!(config.stream_frames);
        assert_eq!(config.max_sessions, 32);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ServerConfig::load_from_file(&missing).await,
            Err(ConfigError::Io { .. })
        ));
    }
}
