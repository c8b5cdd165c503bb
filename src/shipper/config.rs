use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Destination and batching options for one [`LogShipper`](crate::LogShipper).
///
/// Immutable once the shipper is built. Fields omitted from a TOML file take
/// their defaults; explicit zeros are rejected by [`ShipperConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShipperConfig {
    /// Collector host, optionally with a `:port` suffix
    pub host: String,
    /// Request path, must start with `/`
    pub path: String,
    /// `https` when true, plain `http` otherwise
    pub tls: bool,
    pub gzip: bool,
    /// Echo session-affinity cookies returned by the collector
    pub cookies: bool,
    /// Buffer length that triggers an immediate flush
    pub max_messages: usize,
    pub flush_interval_ms: u64,
    /// Upper bound on concurrently in-flight requests
    pub max_sockets: usize,
    /// Idle keep-alive connections kept per host
    pub max_idle_sockets: usize,
    pub socket_timeout_ms: u64,
    pub keep_alive_timeout_ms: u64,
    pub accept_invalid_certs: bool,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            path: "/".to_string(),
            tls: true,
            gzip: false,
            cookies: false,
            max_messages: 10,
            flush_interval_ms: 1000,
            max_sockets: 32,
            max_idle_sockets: 8,
            socket_timeout_ms: 10_000,
            keep_alive_timeout_ms: 5_000,
            accept_invalid_certs: false,
        }
    }
}

impl ShipperConfig {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("host must not be empty".to_string()));
        }
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidConfig(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        if self.max_messages == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_messages must be greater than 0".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "flush_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_sockets == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_sockets must be greater than 0".to_string(),
            ));
        }
        if self.max_sockets > Semaphore::MAX_PERMITS {
            return Err(ConfigError::InvalidConfig(format!(
                "max_sockets must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.socket_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "socket_timeout_ms must be greater than 0".to_string(),
            ));
        }

        self.endpoint_url().map(|_| ())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let scheme = if self.tls { "https" } else { "http" };
        let raw = format!("{scheme}://{}{}", self.host, self.path);
        Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(format!("{raw}: {e}")))
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn keep_alive_timeout(&self) -> Duration {
        Duration::from_millis(self.keep_alive_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShipperConfig::new("collectors.example.com", "/receiver/v1/http/abc");
        assert!(!config.gzip);
        assert!(!config.cookies);
        assert_eq!(config.max_messages, 10);
        assert_eq!(config.flush_interval(), Duration::from_millis(1000));
        assert_eq!(config.max_sockets, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_url_scheme() {
        let mut config = ShipperConfig::new("127.0.0.1:8080", "/ingest");
        assert_eq!(
            config.endpoint_url().unwrap().as_str(),
            "https://127.0.0.1:8080/ingest"
        );

        config.tls = false;
        assert_eq!(
            config.endpoint_url().unwrap().as_str(),
            "http://127.0.0.1:8080/ingest"
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let base = ShipperConfig::new("example.com", "/logs");

        let empty_host = ShipperConfig {
            host: "  ".to_string(),
            ..base.clone()
        };
        assert!(matches!(empty_host.validate(), Err(ConfigError::InvalidConfig(_))));

        let bad_path = ShipperConfig {
            path: "logs".to_string(),
            ..base.clone()
        };
        assert!(bad_path.validate().is_err());

        let zero_threshold = ShipperConfig {
            max_messages: 0,
            ..base.clone()
        };
        assert!(zero_threshold.validate().is_err());

        let zero_interval = ShipperConfig {
            flush_interval_ms: 0,
            ..base.clone()
        };
        assert!(zero_interval.validate().is_err());

        let zero_sockets = ShipperConfig {
            max_sockets: 0,
            ..base.clone()
        };
        assert!(zero_sockets.validate().is_err());

        let unbounded_sockets = ShipperConfig {
            max_sockets: usize::MAX,
            ..base.clone()
        };
        assert!(matches!(unbounded_sockets.validate(), Err(ConfigError::InvalidConfig(_))));

        let timer_only = ShipperConfig {
            max_messages: usize::MAX,
            ..base.clone()
        };
        assert!(timer_only.validate().is_ok());

        let bad_host = ShipperConfig {
            host: "exa mple.com".to_string(),
            ..base
        };
        assert!(matches!(bad_host.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_from_toml_applies_defaults() {
        let config = ShipperConfig::from_toml_str(
            r#"
            host = "collectors.example.com"
            path = "/receiver"
            gzip = true
            max_messages = 1000
            "#,
        )
        .unwrap();

        assert!(config.gzip);
        assert_eq!(config.max_messages, 1000);
        assert_eq!(config.flush_interval_ms, 1000);
        assert_eq!(config.max_idle_sockets, 8);
        assert!(config.tls);
    }

    #[test]
    fn test_from_toml_rejects_unknown_fields() {
        let result = ShipperConfig::from_toml_str("host = \"a\"\nretries = 3\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
