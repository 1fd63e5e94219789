//! Resolver and server configuration
//!
//! Values come from command-line flags with environment fallbacks (see
//! `main.rs`); the defaults here match the public service.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Origin of the hosting service
pub const DEFAULT_ORIGIN: &str = "https://lanzoui.com";

/// Timeout for a whole request to the hosting service
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for establishing a connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_PORT: u16 = 3000;

/// How to reach the hosting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Scheme and host every relative page path is joined against
    pub origin: String,

    pub request_timeout: Duration,

    pub connect_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ResolverConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = Url::parse(&self.origin)
            .map_err(|_| ConfigError::InvalidOrigin(self.origin.clone()))?;
        if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
            return Err(ConfigError::InvalidOrigin(self.origin.clone()));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("request"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("connect"));
        }

        Ok(())
    }
}

/// Where the endpoint listens and where it counts requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: IpAddr,

    pub port: u16,

    /// Counters database; `None` means the default location
    pub stats_db: Option<PathBuf>,

    /// Whether requests are counted at all
    pub counting: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            stats_db: None,
            counting: true,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Path of the counters database, explicit or default
    pub fn stats_db_path(&self) -> Option<PathBuf> {
        self.stats_db.clone().or_else(default_stats_db)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.counting {
            return Ok(());
        }

        match self.stats_db_path() {
            Some(path) if path.is_dir() => Err(ConfigError::StatsPathIsDirectory(path)),
            Some(_) => Ok(()),
            None => Err(ConfigError::NoDataDir),
        }
    }
}

/// `<data_dir>/lanzou-resolver/stats.db`
pub fn default_stats_db() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("lanzou-resolver").join("stats.db"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Service origin must be an http(s) URL: {0}")]
    InvalidOrigin(String),

    #[error("The {0} timeout must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("Counters database path is a directory: {0}")]
    StatsPathIsDirectory(PathBuf),

    #[error("No data directory found; pass --stats-db or --no-stats")]
    NoDataDir,
}
