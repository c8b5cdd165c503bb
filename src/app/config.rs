use crate::shipper::{ConfigError, ShipperConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Synthetic traffic generator that pushes padded log lines through a
/// [`LogShipper`](crate::LogShipper) for a fixed amount of time.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Collector host (with optional :port)
    #[arg(long, env = "SHIPPER_HOST")]
    pub host: Option<String>,

    /// Collector request path
    #[arg(long, env = "SHIPPER_PATH")]
    pub path: Option<String>,

    /// Base shipper configuration file (TOML); flags override its values
    #[arg(long = "config", env = "SHIPPER_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// How long to generate traffic, in milliseconds
    #[arg(long, env = "SHIPPER_RUN_MILLIS", default_value = "10000")]
    pub run_millis: u64,

    /// Messages generated per tick
    #[arg(long, env = "SHIPPER_BATCH", default_value = "50")]
    pub batch: usize,

    /// Milliseconds between ticks
    #[arg(long, env = "SHIPPER_TICK_MILLIS", default_value = "1")]
    pub tick_millis: u64,

    /// Buffered messages that trigger a flush
    #[arg(long = "buffer", env = "SHIPPER_MAX_MESSAGES", default_value = "100")]
    pub max_messages: usize,

    /// Flush interval in milliseconds
    #[arg(long = "timeout-millis", env = "SHIPPER_FLUSH_INTERVAL_MS")]
    pub flush_interval_ms: Option<u64>,

    /// Maximum concurrent requests
    #[arg(long, env = "SHIPPER_MAX_SOCKETS")]
    pub max_sockets: Option<usize>,

    /// Gzip request bodies
    #[arg(long, env = "SHIPPER_GZIP")]
    pub gzip: bool,

    /// Echo session-affinity cookies
    #[arg(long, env = "SHIPPER_COOKIES")]
    pub cookies: bool,

    /// Use http instead of https
    #[arg(long, env = "SHIPPER_PLAIN_HTTP")]
    pub plain_http: bool,

    /// Accept any TLS certificate from the collector
    #[arg(long, env = "SHIPPER_SKIP_CERT_VALIDATION")]
    pub skip_cert_validation: bool,

    /// Record requests in memory instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Milliseconds to wait for in-flight requests after shutdown
    #[arg(long, env = "SHIPPER_DRAIN_MILLIS", default_value = "2000")]
    pub drain_millis: u64,

    /// Log level
    #[arg(long, env = "SHIPPER_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Shortcut for --log-level debug
    #[arg(long)]
    pub debug: bool,
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }

    /// Layers the command-line flags over the config file (or defaults).
    pub fn shipper_config(&self) -> Result<ShipperConfig, ConfigError> {
        let mut config = match &self.config_file {
            Some(path) => ShipperConfig::from_file(path)?,
            None => ShipperConfig::default(),
        };

        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(path) = &self.path {
            config.path.clone_from(path);
        }
        config.max_messages = self.max_messages;
        if let Some(interval) = self.flush_interval_ms {
            config.flush_interval_ms = interval;
        }
        if let Some(max_sockets) = self.max_sockets {
            config.max_sockets = max_sockets;
        }
        config.gzip |= self.gzip;
        config.cookies |= self.cookies;
        config.accept_invalid_certs |= self.skip_cert_validation;
        if self.plain_http {
            config.tls = false;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn run_duration(&self) -> Duration {
        Duration::from_millis(self.run_millis)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_build_shipper_config() {
        let config = Config::from_args([
            "rask-log-shipper",
            "--host",
            "collectors.example.com",
            "--path",
            "/receiver/v1/http/token",
            "--timeout-millis",
            "250",
            "--gzip",
            "--skip-cert-validation",
        ])
        .unwrap();

        let shipper = config.shipper_config().unwrap();
        assert_eq!(shipper.host, "collectors.example.com");
        assert_eq!(shipper.max_messages, 100);
        assert_eq!(shipper.flush_interval_ms, 250);
        assert_eq!(shipper.max_sockets, 32);
        assert!(shipper.gzip);
        assert!(shipper.accept_invalid_certs);
        assert!(shipper.tls);
    }

    #[test]
    fn test_missing_host_is_rejected() {
        let config = Config::from_args(["rask-log-shipper", "--path", "/x"]).unwrap();
        assert!(config.shipper_config().is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "host = \"from-file.example.com\"\npath = \"/file\"\nmax_sockets = 4\ngzip = true"
        )
        .unwrap();

        let config = Config::from_args([
            "rask-log-shipper",
            "--config",
            file.path().to_str().unwrap(),
            "--path",
            "/flag",
            "--buffer",
            "500",
            "--plain-http",
        ])
        .unwrap();

        let shipper = config.shipper_config().unwrap();
        assert_eq!(shipper.host, "from-file.example.com");
        assert_eq!(shipper.path, "/flag");
        assert_eq!(shipper.max_messages, 500);
        assert_eq!(shipper.max_sockets, 4);
        assert!(shipper.gzip);
        assert!(!shipper.tls);
    }

    #[test]
    fn test_debug_flag_overrides_level() {
        let config = Config::from_args(["rask-log-shipper", "--debug"]).unwrap();
        assert_eq!(config.effective_log_level(), LogLevel::Debug);
        assert_eq!(tracing::Level::from(config.effective_log_level()), tracing::Level::DEBUG);
    }
}
